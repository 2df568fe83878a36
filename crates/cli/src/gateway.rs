//! One question through the pipeline:
//! `Received → Validated → Synthesized → Executed → Responded`, where every
//! failure becomes a [`GatewayError`] with a fixed status and kind.

use tabula_expr::{Answer, ExecError};
use tabula_protocol::{
    ErrorEnvelope, ErrorKind, QueryResponse, INTERNAL_FAULT_MESSAGE, MISSING_QUERY_MESSAGE,
};
use tabula_synth::SynthesisError;

use crate::context::AppContext;

const SYNTHESIS_FAILED_MESSAGE: &str = "The model provider request failed.";

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayError {
    MissingQuery,
    Synthesis(SynthesisError),
    Execution(ExecError),
    /// Detail is logged, never returned.
    Internal(String),
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingQuery => ErrorKind::MissingQuery,
            Self::Synthesis(SynthesisError::InvalidExpression(_)) => ErrorKind::InvalidExpression,
            Self::Synthesis(SynthesisError::Timeout(_)) => ErrorKind::SynthesisTimeout,
            Self::Synthesis(SynthesisError::Failed(_)) => ErrorKind::SynthesisFailed,
            Self::Execution(err) if err.is_result_too_large() => ErrorKind::ResultTooLarge,
            Self::Execution(_) => ErrorKind::EvaluationError,
            Self::Internal(_) => ErrorKind::InternalFault,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Message safe to show a client.
    pub fn public_message(&self) -> String {
        match self {
            Self::MissingQuery => MISSING_QUERY_MESSAGE.to_string(),
            Self::Synthesis(SynthesisError::Failed(_)) => SYNTHESIS_FAILED_MESSAGE.to_string(),
            Self::Synthesis(err) => err.to_string(),
            Self::Execution(err) => err.to_string(),
            Self::Internal(_) => INTERNAL_FAULT_MESSAGE.to_string(),
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::new(self.kind(), self.public_message())
    }

    fn log(&self, question: &str) {
        match self {
            Self::Internal(detail) => log::error!("Query {question:?} failed: {detail}"),
            Self::Synthesis(err) => log::warn!("Query {question:?} failed to synthesize: {err}"),
            other => log::warn!("Query {question:?} failed ({}): {}", other.kind(), other.public_message()),
        }
    }
}

impl From<SynthesisError> for GatewayError {
    fn from(err: SynthesisError) -> Self {
        Self::Synthesis(err)
    }
}

impl From<ExecError> for GatewayError {
    fn from(err: ExecError) -> Self {
        Self::Execution(err)
    }
}

/// Answers one non-blank question.
pub async fn answer(ctx: &AppContext, question: &str) -> Result<QueryResponse, GatewayError> {
    let outcome = run(ctx, question).await;
    match &outcome {
        Ok(_) => log::info!("Query {question:?} answered"),
        Err(err) => err.log(question),
    }
    outcome
}

async fn run(ctx: &AppContext, question: &str) -> Result<QueryResponse, GatewayError> {
    let expression = ctx
        .synthesizer()
        .synthesize(question, ctx.preview())
        .await?;
    log::info!("Query {question:?} -> {expression}");

    let answer = evaluate(ctx, expression).await?;
    Ok(QueryResponse {
        query: question.to_string(),
        result: answer.into_value(),
    })
}

/// Runs the executor on the blocking pool.
pub async fn evaluate(ctx: &AppContext, expression: String) -> Result<Answer, GatewayError> {
    let executor = ctx.executor().clone();
    match tokio::task::spawn_blocking(move || executor.execute(&expression)).await {
        Ok(result) => result.map_err(GatewayError::from),
        Err(join) => Err(GatewayError::Internal(format!("evaluation task failed: {join}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn kinds_and_statuses() {
        let cases = [
            (GatewayError::MissingQuery, ErrorKind::MissingQuery, 400),
            (
                SynthesisError::InvalidExpression("x".into()).into(),
                ErrorKind::InvalidExpression,
                502,
            ),
            (
                SynthesisError::Timeout(Duration::from_secs(30)).into(),
                ErrorKind::SynthesisTimeout,
                502,
            ),
            (
                SynthesisError::Failed("dns".into()).into(),
                ErrorKind::SynthesisFailed,
                502,
            ),
            (
                ExecError::DisallowedOperation("to_csv".into()).into(),
                ErrorKind::EvaluationError,
                422,
            ),
            (
                ExecError::ResultTooLarge { cells: 2000, limit: 1000 }.into(),
                ErrorKind::ResultTooLarge,
                422,
            ),
            (GatewayError::Internal("boom".into()), ErrorKind::InternalFault, 500),
        ];
        for (err, kind, status) in cases {
            assert_eq!(err.kind(), kind);
            assert_eq!(err.status_code(), status);
        }
    }

    #[test]
    fn provider_and_internal_detail_stay_private() {
        let failed = GatewayError::from(SynthesisError::Failed("10.0.0.7 refused".into()));
        assert!(!failed.public_message().contains("10.0.0.7"));
        let internal = GatewayError::Internal("panicked at src/eval.rs".into());
        assert_eq!(internal.public_message(), INTERNAL_FAULT_MESSAGE);
        assert_eq!(
            GatewayError::MissingQuery.envelope(),
            ErrorEnvelope::new(ErrorKind::MissingQuery, "Query string is required.")
        );
    }
}
