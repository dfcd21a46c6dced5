//! Process wiring: configuration in, one running filter (or sender) out.

use std::future::Future;
use std::sync::Arc;

use shared_bus::{PipeConnector, PipeEndpoint};
use shared_types::ConfigurationError;
use tracing::info;

use crate::builder::build_filter;
use crate::config::{FilterKind, RuntimeConfig};
use crate::outputs::OutputSet;
use crate::runner::{FilterRunner, RunnerError};
use crate::sender::Sender;

/// How a process run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A runner stopped; counters at shutdown.
    Filtered(crate::runner::RunSummary),
    /// A sender stopped after this many messages.
    Sent(u64),
}

/// Build and run whatever `config` describes until `shutdown` resolves or the
/// input stream ends.
///
/// # Errors
///
/// [`RunnerError::Configuration`] before anything connects; any other variant
/// once running.
pub async fn run_filter<S>(
    config: RuntimeConfig,
    connector: Arc<dyn PipeConnector>,
    shutdown: S,
) -> Result<RunOutcome, RunnerError>
where
    S: Future<Output = ()>,
{
    let endpoint = Arc::new(PipeEndpoint::new(connector));

    if config.kind == FilterKind::Sender {
        let output = config
            .outputs
            .first()
            .cloned()
            .ok_or_else(|| ConfigurationError::Missing("EIP_OUT".into()))?;
        let data = config
            .sender_data
            .clone()
            .ok_or_else(|| ConfigurationError::Missing("EIP_DATA".into()))?;
        let sender = Sender::new(endpoint, output, config.identity, data, config.interval);
        return Ok(RunOutcome::Sent(sender.run_until(shutdown).await?));
    }

    let input = config
        .input
        .clone()
        .ok_or_else(|| ConfigurationError::Missing("EIP_IN".into()))?;
    let filter = build_filter(&config)?;
    let outputs = OutputSet::new(config.outputs, Some(input.address.clone()));

    info!(
        kind = %config.kind,
        input = %input,
        outputs = outputs.outputs().len(),
        "Starting filter"
    );
    let mut runner =
        FilterRunner::new(filter, endpoint, input, outputs).with_decode_policy(config.decode_policy);
    Ok(RunOutcome::Filtered(runner.run_until(shutdown).await?))
}
