//! Claim Orchestrator
//!
//! Drives every wallet through the claim flow, one wallet at a time:
//!
//! ```text
//! Start -> Signed -> Authenticated -> AlreadyClaimed ----------> Done
//!                                  \-> Claimed -> Verified ----> Done
//! ```
//!
//! A failure at any stage ends that wallet only; it becomes a result row
//! tagged with the failing stage and the sweep moves on.
//!
//! The run total counts each wallet's allocation as reported at
//! authentication time, once, as soon as authentication succeeds. Figures
//! returned by the later verification call are shown in the wallet's row
//! but never feed the total.

use std::fmt;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tracing::{debug, info, warn};

use crate::client::{AuthenticateRequest, AuthenticateResponse, ClaimApi, UserInfo};
use crate::keystore::Signer;
use crate::signing::{challenge_digest, to_wire_signature, WireSignature};
use crate::wallet::Wallet;

/// Stage of the claim flow at which a wallet failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Sign,
    Authenticate,
    Claim,
    Verify,
}

impl Stage {
    /// Label used in the error column.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Sign => "sign",
            Stage::Authenticate => "authenticate",
            Stage::Claim => "claim",
            Stage::Verify => "user",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A stage failure with its error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: Stage,
    pub message: String,
}

impl StageFailure {
    fn new(stage: Stage, err: impl fmt::Display) -> Self {
        Self {
            stage,
            message: err.to_string(),
        }
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.message)
    }
}

/// Claim fields shown for a wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimStatus {
    pub total_allocation: i64,
    pub has_claimed_points: bool,
    pub points_claimed: String,
}

impl From<&UserInfo> for ClaimStatus {
    fn from(info: &UserInfo) -> Self {
        Self {
            total_allocation: info.total_allocation,
            has_claimed_points: info.has_claimed_points,
            points_claimed: info.points_claimed.clone(),
        }
    }
}

/// Result of processing one wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub wallet: Wallet,
    /// Claim fields to display; absent when the wallet never authenticated.
    pub status: Option<ClaimStatus>,
    /// Allocation this wallet contributes to the run total.
    pub counted_allocation: Option<i64>,
    pub failure: Option<StageFailure>,
}

impl ClaimOutcome {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    pub fn failed_stage(&self) -> Option<Stage> {
        self.failure.as_ref().map(|f| f.stage)
    }

    fn failed(wallet: &Wallet, failure: StageFailure) -> Self {
        Self {
            wallet: wallet.clone(),
            status: None,
            counted_allocation: None,
            failure: Some(failure),
        }
    }
}

/// Outcome of a whole sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub outcomes: Vec<ClaimOutcome>,
    pub total_allocation: i64,
    /// Set when the sweep stopped early on cancellation.
    pub cancelled: bool,
}

impl RunSummary {
    fn record(&mut self, outcome: ClaimOutcome) {
        if let Some(allocation) = outcome.counted_allocation {
            self.total_allocation = self.total_allocation.saturating_add(allocation);
        }
        self.outcomes.push(outcome);
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }
}

/// Receives a tick after every processed wallet.
pub trait ProgressSink {
    fn advance(&self);
}

/// Progress sink that ignores ticks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn advance(&self) {}
}

/// Authenticated session for one wallet.
struct AuthSession {
    token: String,
    user_info: UserInfo,
}

impl From<AuthenticateResponse> for AuthSession {
    fn from(response: AuthenticateResponse) -> Self {
        Self {
            token: response.token,
            user_info: response.user_info,
        }
    }
}

enum ClaimState {
    Start,
    Signed(WireSignature),
    Authenticated(AuthSession),
    Claimed(AuthSession),
    Done(ClaimOutcome),
}

/// Runs the claim flow for a list of wallets.
pub struct Claimer<S, A> {
    signer: S,
    api: A,
    cancel: Option<Arc<AtomicBool>>,
}

impl<S: Signer, A: ClaimApi> Claimer<S, A> {
    pub fn new(signer: S, api: A) -> Self {
        Self {
            signer,
            api,
            cancel: None,
        }
    }

    /// Stop the sweep before the next wallet once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    /// Process every wallet in order and fold the results into a summary.
    pub async fn run<P: ProgressSink>(&self, wallets: &[Wallet], progress: &P) -> RunSummary {
        let mut summary = RunSummary::default();

        for wallet in wallets {
            if self.is_cancelled() {
                warn!(
                    "Claim run cancelled with {} of {} wallets processed",
                    summary.outcomes.len(),
                    wallets.len()
                );
                summary.cancelled = true;
                break;
            }

            let outcome = self.process_wallet(wallet).await;
            summary.record(outcome);
            progress.advance();
        }

        info!(
            "Processed {} wallets ({} failed), total allocation {}",
            summary.outcomes.len(),
            summary.failed_count(),
            summary.total_allocation
        );

        summary
    }

    /// Run the claim flow for a single wallet.
    pub async fn process_wallet(&self, wallet: &Wallet) -> ClaimOutcome {
        let mut state = ClaimState::Start;
        loop {
            state = match state {
                ClaimState::Done(outcome) => return outcome,
                state => self.step(wallet, state).await,
            };
        }
    }

    async fn step(&self, wallet: &Wallet, state: ClaimState) -> ClaimState {
        match state {
            ClaimState::Start => match self.sign(wallet) {
                Ok(signature) => ClaimState::Signed(signature),
                Err(failure) => self.fail(wallet, failure),
            },

            ClaimState::Signed(signature) => {
                let request = AuthenticateRequest {
                    address: wallet.address.to_string(),
                    signature: signature.to_hex(),
                };
                match self.api.authenticate(&request).await {
                    Ok(response) => ClaimState::Authenticated(response.into()),
                    Err(e) => self.fail(wallet, StageFailure::new(Stage::Authenticate, e)),
                }
            }

            ClaimState::Authenticated(session) => {
                let info = &session.user_info;
                if info.has_claimed_points || info.total_allocation == 0 {
                    debug!("{} has nothing to claim", wallet.address);
                    ClaimState::Done(Self::finish(wallet, &session, None))
                } else {
                    match self.api.claim(&session.token).await {
                        Ok(response) => {
                            debug!("{} claimed: {}", wallet.address, response.message);
                            ClaimState::Claimed(session)
                        }
                        Err(e) => {
                            let failure = StageFailure::new(Stage::Claim, e);
                            warn!("{} {}", wallet.address, failure);
                            ClaimState::Done(Self::finish(wallet, &session, Some(failure)))
                        }
                    }
                }
            }

            ClaimState::Claimed(session) => match self.api.user(&session.token).await {
                Ok(verified) => {
                    let mut outcome = Self::finish(wallet, &session, None);
                    outcome.status = Some(ClaimStatus::from(&verified));
                    ClaimState::Done(outcome)
                }
                Err(e) => {
                    let failure = StageFailure::new(Stage::Verify, e);
                    warn!("{} {}", wallet.address, failure);
                    ClaimState::Done(Self::finish(wallet, &session, Some(failure)))
                }
            },

            ClaimState::Done(outcome) => ClaimState::Done(outcome),
        }
    }

    fn sign(&self, wallet: &Wallet) -> Result<WireSignature, StageFailure> {
        let digest = challenge_digest(&wallet.address);
        let raw = self
            .signer
            .sign(&wallet.address, &digest)
            .map_err(|e| StageFailure::new(Stage::Sign, e))?;

        to_wire_signature(&raw).map_err(|e| StageFailure::new(Stage::Sign, e))
    }

    fn fail(&self, wallet: &Wallet, failure: StageFailure) -> ClaimState {
        warn!("{} {}", wallet.address, failure);
        ClaimState::Done(ClaimOutcome::failed(wallet, failure))
    }

    /// Outcome for a wallet that authenticated. The authenticate-time
    /// snapshot provides both the displayed fields and the counted
    /// allocation.
    fn finish(
        wallet: &Wallet,
        session: &AuthSession,
        failure: Option<StageFailure>,
    ) -> ClaimOutcome {
        ClaimOutcome {
            wallet: wallet.clone(),
            status: Some(ClaimStatus::from(&session.user_info)),
            counted_allocation: Some(session.user_info.total_allocation),
            failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ApiError, ClaimResponse};
    use crate::error::SignError;
    use crate::wallet::Address;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use std::sync::Mutex;

    struct FixedSigner;

    impl Signer for FixedSigner {
        fn sign(&self, address: &Address, _digest: &[u8; 32]) -> Result<[u8; 65], SignError> {
            if address.as_bytes()[0] == 0xff {
                return Err(SignError::AccessDenied(*address));
            }
            Ok([1u8; 65])
        }
    }

    #[derive(Default)]
    struct ScriptedApi {
        auth: Option<UserInfo>,
        claim_ok: bool,
        verified: Option<UserInfo>,
        calls: Mutex<Vec<&'static str>>,
        signatures: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ClaimApi for ScriptedApi {
        async fn authenticate(
            &self,
            request: &AuthenticateRequest,
        ) -> Result<AuthenticateResponse, ApiError> {
            self.calls.lock().unwrap().push("authenticate");
            self.signatures.lock().unwrap().push(request.signature.clone());
            match &self.auth {
                Some(info) => Ok(AuthenticateResponse {
                    token: "token".to_string(),
                    user_info: info.clone(),
                }),
                None => Err(ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR)),
            }
        }

        async fn claim(&self, _token: &str) -> Result<ClaimResponse, ApiError> {
            self.calls.lock().unwrap().push("claim");
            if self.claim_ok {
                Ok(ClaimResponse::default())
            } else {
                Err(ApiError::Status(StatusCode::BAD_REQUEST))
            }
        }

        async fn user(&self, _token: &str) -> Result<UserInfo, ApiError> {
            self.calls.lock().unwrap().push("user");
            self.verified
                .clone()
                .ok_or(ApiError::Status(StatusCode::UNAUTHORIZED))
        }
    }

    fn info(allocation: i64, claimed: bool) -> UserInfo {
        UserInfo {
            total_allocation: allocation,
            has_claimed_points: claimed,
            points_claimed: allocation.to_string(),
            ..Default::default()
        }
    }

    fn wallet() -> Wallet {
        Wallet::new("w", Address::new([0x11; 20]))
    }

    #[tokio::test]
    async fn test_wire_signature_sent_with_legacy_v() {
        let api = ScriptedApi {
            auth: Some(info(0, false)),
            ..Default::default()
        };
        let claimer = Claimer::new(FixedSigner, api);
        claimer.process_wallet(&wallet()).await;

        let signatures = claimer.api().signatures.lock().unwrap();
        assert_eq!(signatures.len(), 1);
        assert!(signatures[0].starts_with("0x0101"));
        assert!(signatures[0].ends_with("1c"));
    }

    #[tokio::test]
    async fn test_zero_allocation_skips_claim() {
        let api = ScriptedApi {
            auth: Some(info(0, false)),
            ..Default::default()
        };
        let claimer = Claimer::new(FixedSigner, api);
        let outcome = claimer.process_wallet(&wallet()).await;

        assert!(outcome.is_success());
        assert_eq!(outcome.counted_allocation, Some(0));
        assert_eq!(*claimer.api().calls.lock().unwrap(), vec!["authenticate"]);
    }

    #[tokio::test]
    async fn test_sign_failure_skips_network() {
        let claimer = Claimer::new(FixedSigner, ScriptedApi::default());
        let outcome = claimer
            .process_wallet(&Wallet::new("locked", Address::new([0xff; 20])))
            .await;

        assert_eq!(outcome.failed_stage(), Some(Stage::Sign));
        assert_eq!(outcome.status, None);
        assert_eq!(outcome.counted_allocation, None);
        assert!(claimer.api().calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claim_failure_keeps_snapshot() {
        let api = ScriptedApi {
            auth: Some(info(300, false)),
            claim_ok: false,
            ..Default::default()
        };
        let claimer = Claimer::new(FixedSigner, api);
        let outcome = claimer.process_wallet(&wallet()).await;

        assert_eq!(outcome.failed_stage(), Some(Stage::Claim));
        assert_eq!(outcome.counted_allocation, Some(300));
        assert_eq!(outcome.status, Some(ClaimStatus::from(&info(300, false))));
        assert_eq!(
            outcome.failure.unwrap().to_string(),
            "claim: invalid status code: 400 Bad Request"
        );
        assert_eq!(
            *claimer.api().calls.lock().unwrap(),
            vec!["authenticate", "claim"]
        );
    }

    #[tokio::test]
    async fn test_verify_failure_labelled_user() {
        let api = ScriptedApi {
            auth: Some(info(300, false)),
            claim_ok: true,
            verified: None,
            ..Default::default()
        };
        let claimer = Claimer::new(FixedSigner, api);
        let outcome = claimer.process_wallet(&wallet()).await;

        assert_eq!(outcome.failed_stage(), Some(Stage::Verify));
        assert!(outcome.failure.unwrap().to_string().starts_with("user: "));
        assert_eq!(outcome.counted_allocation, Some(300));
    }

    #[test]
    fn test_total_saturates() {
        let counted = |allocation| ClaimOutcome {
            wallet: wallet(),
            status: None,
            counted_allocation: Some(allocation),
            failure: None,
        };

        let mut summary = RunSummary::default();
        summary.record(counted(i64::MAX - 1));
        summary.record(counted(10));
        assert_eq!(summary.total_allocation, i64::MAX);
        assert_eq!(summary.outcomes.len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_wallet() {
        let flag = Arc::new(AtomicBool::new(true));
        let claimer = Claimer::new(FixedSigner, ScriptedApi::default()).with_cancel_flag(flag);
        let summary = claimer.run(&[wallet(), wallet()], &NoProgress).await;

        assert!(summary.cancelled);
        assert!(summary.outcomes.is_empty());
        assert_eq!(summary.total_allocation, 0);
    }
}
