use anyhow::Result;
use std::sync::atomic::Ordering;
use tracing::warn;

use exam_bank::utils::logging::init_tracing;
use exam_bank::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // tracing needs VERBOSE_LOGGING, so config problems are logged after init
    let (config, problems) = Config::from_env_checked();
    init_tracing(config.verbose_logging);
    for problem in &problems {
        warn!("⚠️ {}, using default", problem);
    }

    let app = App::initialize(config).await?;

    // Ctrl-C: finish the current oracle call, start no new ones
    let cancel = app.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ Interrupt received, finishing the current step");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let summary = app.run().await?;
    if summary.counts.failed > 0 || summary.cancelled {
        warn!(
            "⚠️ {} failed, {} unresolved; see the review file",
            summary.counts.failed, summary.counts.unresolved
        );
    }

    Ok(())
}
