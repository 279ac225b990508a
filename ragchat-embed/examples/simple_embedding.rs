//! Embed a few questions with the configured provider and print how close they are

use half::f16;
use ragchat_embed::{EmbedConfig, ProviderKind, create_provider};

fn cosine(a: &[f16], b: &[f16]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x.to_f32() * y.to_f32()).sum()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // `cargo run --example simple_embedding -- ollama` uses a local Ollama server
    let config = match std::env::args().nth(1).as_deref() {
        Some("ollama") => EmbedConfig::ollama("http://localhost:11434", "nomic-embed-text"),
        _ => EmbedConfig::fastembed(std::env::temp_dir().join("ragchat-models"), "all-minilm-l6-v2"),
    };
    let kind: ProviderKind = config.provider;

    let provider = create_provider(config).await?;
    println!("Provider: {} ({kind})", provider.provider_name());

    let questions = vec![
        "How can I save energy?".to_string(),
        "What are ways to reduce power use?".to_string(),
        "Who wrote War and Peace?".to_string(),
    ];
    let result = provider.embed_texts(&questions).await?;
    println!("Dimension: {}", result.dimension);

    for (i, a) in questions.iter().enumerate() {
        for (j, b) in questions.iter().enumerate().skip(i + 1) {
            println!(
                "{:.3}  {a:?} <-> {b:?}",
                cosine(&result.embeddings[i], &result.embeddings[j])
            );
        }
    }
    Ok(())
}
