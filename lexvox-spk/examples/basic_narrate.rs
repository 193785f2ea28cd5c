//! Basic narration example

use lexvox_spk::{Article, NarrationConfig, NarrationEngine};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let engine = NarrationEngine::from_config(NarrationConfig::default())?;
    if !engine.is_supported() {
        eprintln!("No speech backend available (is espeak-ng installed?)");
        return Ok(());
    }

    println!("Portuguese voices:");
    for voice in engine.portuguese_voices() {
        println!("  {} ({})", voice.name, voice.locale);
    }

    let subscription = engine.subscribe(|state| {
        println!("[{}] {}", state.status(), state.text);
    });

    let mut updates = engine.watch();
    engine.narrate_article(&Article::new(
        "5º",
        "Todos são iguais perante a lei, sem distinção de qualquer natureza. \
         § 1º As normas definidoras dos direitos fundamentais têm aplicação imediata.",
    ));

    // Wait for the article to finish, giving up after a minute
    let finished = tokio::time::timeout(Duration::from_secs(60), async {
        while let Ok(state) = updates.recv().await {
            if state.is_idle() {
                break;
            }
        }
    })
    .await;

    if finished.is_err() {
        engine.stop();
    }
    subscription.unsubscribe();
    Ok(())
}
