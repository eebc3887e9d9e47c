//! Default mode: answer JSON requests on stdin until it closes.

use tagger_core::{Config, EmbeddingContext, RequestLoop};

pub async fn execute(config: Config) -> anyhow::Result<()> {
    tracing::info!("Tagger service started (model dir: {})", config.model_dir().display());

    // The loop does blocking stdio and CPU-bound inference, one line at a time.
    let served = tokio::task::spawn_blocking(move || -> anyhow::Result<usize> {
        let mut embeddings = EmbeddingContext::from_config(&config);
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        let served =
            RequestLoop::new(&mut embeddings, &config.analysis).run(stdin.lock(), stdout.lock())?;
        Ok(served)
    })
    .await??;

    tracing::info!("Input closed, served {served} requests");
    Ok(())
}
