//! TransactionComposer: turns a user's (time, recipient, amount) intent into a
//! single funded `newReq` call on the registry.

use std::str::FromStr;

use alloy_primitives::{aliases::U112, Address, Bytes, U256};
use alloy_sol_types::SolInterface;
use chrono::{NaiveDateTime, TimeZone, Utc};
use relaypay_types::{
    to_smallest_unit, total_value, ChainId, ProviderError, Submission, ValidationError,
    WalletConnector,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    abi::{ContractInterface, IRegistry, ISender, Sender},
    binder::{BindingError, SendOptions},
    connection::ConnectionManager,
};

const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ComposeError {
    #[error("no wallet session is open")]
    NotConnected,
    #[error("wallet is on network {chain_id:?}, submissions require network {accepted}")]
    WrongNetwork {
        chain_id: Option<ChainId>,
        accepted: ChainId,
    },
    #[error("wallet exposes no account")]
    NoAccount,
    #[error("amount plus fee overflows 256 bits")]
    ValueOverflow,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Binding(#[from] BindingError),
}

impl ComposeError {
    /// Refusals raised before any input is looked at: no session (and so no
    /// bindings, which live exactly as long as it), wrong network, or no
    /// signing account.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotConnected | Self::WrongNetwork { .. } | Self::NoAccount
        )
    }
}

/// Raw user input, as typed into the payment form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    /// Local date-time, `YYYY-MM-DDTHH:MM[:SS[.fff]]`.
    pub execute_at: String,
    pub recipient: String,
    /// Decimal amount in the base currency.
    pub amount: String,
}

impl PaymentIntent {
    pub fn new(
        execute_at: impl Into<String>,
        recipient: impl Into<String>,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            execute_at: execute_at.into(),
            recipient: recipient.into(),
            amount: amount.into(),
        }
    }
}

/// Fully validated request, ready to be sent to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledPaymentRequest {
    pub execute_at: u64,
    pub recipient: Address,
    pub amount: U256,
    pub fee: U256,
    pub total_value: U256,
    /// Sender contract that the registry will call.
    pub target: Address,
    /// Encoded `sendEthAtTime(execute_at, recipient)`.
    pub payload: Bytes,
}

impl ScheduledPaymentRequest {
    pub fn registry_call(&self) -> Result<IRegistry::newReqCall, ComposeError> {
        Ok(IRegistry::newReqCall {
            target: self.target,
            referer: Address::ZERO,
            callData: self.payload.clone(),
            ethForCall: to_uint112(self.amount)?,
            verifyUser: false,
            insertFeeAmount: false,
        })
    }
}

/// Parses a local date-time and converts it to Unix seconds in `tz`.
///
/// Sub-second precision is truncated. Ambiguous local times resolve to the
/// earliest instant; local times skipped by a DST transition and instants
/// before the epoch are rejected.
pub fn to_unix_seconds<Tz: TimeZone>(local: &str, tz: &Tz) -> Result<u64, ValidationError> {
    let invalid = |reason| ValidationError::InvalidDateTime {
        input: local.to_string(),
        reason,
    };
    let naive = DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(local.trim(), format).ok())
        .ok_or_else(|| invalid("expected YYYY-MM-DDTHH:MM[:SS[.fff]]"))?;
    let instant = tz
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| invalid("local time does not exist in the configured time zone"))?;
    u64::try_from(instant.timestamp()).map_err(|_| invalid("before the Unix epoch"))
}

fn to_uint112(amount: U256) -> Result<U112, ValidationError> {
    if amount.bit_len() > U112::BITS {
        return Err(ValidationError::InvalidAmount {
            input: amount.to_string(),
            reason: "exceeds the registry's uint112 limit",
        });
    }
    let limbs = amount.as_limbs();
    Ok(U112::from_limbs([limbs[0], limbs[1]]))
}

fn parse_recipient(input: &str) -> Result<Address, ValidationError> {
    let recipient = Address::from_str(input.trim())
        .map_err(|_| ValidationError::InvalidAddress(input.to_string()))?;
    if recipient.is_zero() {
        return Err(ValidationError::InvalidAddress(input.to_string()));
    }
    Ok(recipient)
}

#[derive(Debug, Clone)]
pub struct TransactionComposer<Tz: TimeZone = Utc> {
    timezone: Tz,
}

impl TransactionComposer<Utc> {
    pub fn new() -> Self {
        Self { timezone: Utc }
    }
}

impl Default for TransactionComposer<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Tz: TimeZone> TransactionComposer<Tz> {
    /// Interprets user date-times in `timezone` instead of UTC.
    pub fn with_timezone(timezone: Tz) -> Self {
        Self { timezone }
    }

    pub fn timezone(&self) -> &Tz {
        &self.timezone
    }

    /// Validates and encodes `intent` without touching the wallet.
    pub fn compose(
        &self,
        target: Address,
        fee: U256,
        intent: &PaymentIntent,
    ) -> Result<ScheduledPaymentRequest, ComposeError> {
        let execute_at = to_unix_seconds(&intent.execute_at, &self.timezone)?;
        let recipient = parse_recipient(&intent.recipient)?;
        let amount = to_smallest_unit(&intent.amount)?;
        if amount.is_zero() {
            return Err(ValidationError::InvalidAmount {
                input: intent.amount.clone(),
                reason: "amount must be greater than zero",
            }
            .into());
        }
        to_uint112(amount)?;
        let total_value = total_value(amount, fee).ok_or(ComposeError::ValueOverflow)?;

        let payload = <Sender as ContractInterface>::Calls::from(ISender::sendEthAtTimeCall {
            callTime: U256::from(execute_at),
            recipient,
        })
        .abi_encode();

        Ok(ScheduledPaymentRequest {
            execute_at,
            recipient,
            amount,
            fee,
            total_value,
            target,
            payload: Bytes::from(payload),
        })
    }

    /// Checks the session, composes the request, and sends exactly one
    /// `newReq` call. Every failure before the send returns an error and
    /// leaves the wallet untouched.
    pub async fn submit<C: WalletConnector>(
        &self,
        manager: &ConnectionManager<C>,
        intent: &PaymentIntent,
    ) -> Result<Submission, ComposeError> {
        let session = manager.session().ok_or(ComposeError::NotConnected)?;
        if !session.is_on_accepted_network() {
            let err = ComposeError::WrongNetwork {
                chain_id: session.chain_id(),
                accepted: manager.config().accepted_network,
            };
            warn!(error = %err, "refusing submission");
            return Err(err);
        }
        let registry = session.registry();
        let sender = session.sender();

        let from = session
            .accounts()
            .await?
            .into_iter()
            .next()
            .ok_or(ComposeError::NoAccount)?;

        let request = self.compose(sender.address(), manager.config().protocol_fee, intent)?;
        let call = request.registry_call()?;
        info!(
            %from,
            recipient = %request.recipient,
            execute_at = request.execute_at,
            amount = %request.amount,
            fee = %request.fee,
            total = %request.total_value,
            "submitting scheduled payment"
        );
        let submission = registry.send(
            call,
            SendOptions {
                from,
                value: request.total_value,
            },
        )?;
        Ok(submission)
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{aliases::U112, Address, U256};
    use alloy_sol_types::SolCall;
    use chrono::{
        Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Utc,
    };
    use relaypay_types::{SubmissionEvent, ValidationError};
    use relaypay_wallet_mock::{DemoScenario, MockWallet, SubmissionOutcome};

    use super::{to_unix_seconds, ComposeError, PaymentIntent, TransactionComposer};
    use crate::{
        abi::{IRegistry, ISender},
        config::DeploymentConfig,
        connection::ConnectionManager,
    };

    const BOB: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

    fn make_manager(scenario: &DemoScenario) -> ConnectionManager<MockWallet> {
        let config = DeploymentConfig::new(scenario.accounts.registry, scenario.accounts.sender);
        ConnectionManager::new(scenario.wallet.clone(), config)
    }

    fn scenario_intent() -> PaymentIntent {
        PaymentIntent::new("2025-01-01T00:00:00", BOB, "1.5")
    }

    /// Central European time for 2025: CEST from 2025-03-30 01:00 UTC until
    /// 2025-10-26 01:00 UTC, CET otherwise.
    #[derive(Debug, Clone, Copy)]
    struct Berlin2025;

    impl Berlin2025 {
        const CET: i32 = 3600;
        const CEST: i32 = 7200;

        fn utc(month: u32, day: u32) -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2025, month, day)
                .unwrap()
                .and_hms_opt(1, 0, 0)
                .unwrap()
        }
    }

    impl TimeZone for Berlin2025 {
        type Offset = FixedOffset;

        fn from_offset(_: &FixedOffset) -> Self {
            Berlin2025
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            // Earlier instant first, so an overlap lists CEST before CET.
            let fits: Vec<FixedOffset> = [Self::CEST, Self::CET]
                .into_iter()
                .map(|secs| FixedOffset::east_opt(secs).unwrap())
                .filter(|offset| {
                    let utc = *local - Duration::seconds(i64::from(offset.local_minus_utc()));
                    self.offset_from_utc_datetime(&utc) == *offset
                })
                .collect();
            match fits.as_slice() {
                [] => LocalResult::None,
                [only] => LocalResult::Single(*only),
                [earliest, latest, ..] => LocalResult::Ambiguous(*earliest, *latest),
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            let summer = *utc >= Self::utc(3, 30) && *utc < Self::utc(10, 26);
            let secs = if summer { Self::CEST } else { Self::CET };
            FixedOffset::east_opt(secs).unwrap()
        }
    }

    #[test]
    fn normalizes_local_time_to_unix_seconds() {
        assert_eq!(to_unix_seconds("2025-01-01T00:00:00", &Utc), Ok(1_735_689_600));
        assert_eq!(to_unix_seconds("2025-01-01T00:00", &Utc), Ok(1_735_689_600));
        assert_eq!(
            to_unix_seconds("2025-01-01T00:00:59.999", &Utc),
            Ok(1_735_689_659)
        );
        let cet = FixedOffset::east_opt(3600).unwrap();
        assert_eq!(
            to_unix_seconds("2025-01-01T01:00:00", &cet),
            Ok(1_735_689_600)
        );
    }

    #[test]
    fn follows_daylight_saving_transitions() {
        assert_eq!(
            to_unix_seconds("2025-01-01T01:00:00", &Berlin2025),
            Ok(1_735_689_600)
        );
        assert_eq!(
            to_unix_seconds("2025-07-01T02:00:00", &Berlin2025),
            Ok(1_751_328_000)
        );
    }

    #[test]
    fn local_time_skipped_by_spring_forward_is_rejected() {
        let err = to_unix_seconds("2025-03-30T02:30", &Berlin2025).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidDateTime { .. }));
        assert_eq!(
            to_unix_seconds("2025-03-30T03:00", &Berlin2025),
            Ok(1_743_296_400)
        );
    }

    #[test]
    fn repeated_local_time_resolves_to_earliest_instant() {
        // 02:30 happens twice; the CEST reading is an hour before the CET one.
        assert_eq!(
            to_unix_seconds("2025-10-26T02:30", &Berlin2025),
            Ok(1_761_438_600)
        );

        let request = TransactionComposer::with_timezone(Berlin2025)
            .compose(
                Address::repeat_byte(0xe2),
                U256::from(1u64),
                &PaymentIntent::new("2025-10-26T02:30:00", BOB, "1"),
            )
            .unwrap();
        assert_eq!(request.execute_at, 1_761_438_600);
    }

    #[test]
    fn rejects_malformed_and_pre_epoch_times() {
        for input in ["", "2025-01-01", "2025-13-01T00:00", "01/01/2025 00:00", "2025-01-01T00:00Z"] {
            assert!(
                matches!(
                    to_unix_seconds(input, &Utc),
                    Err(ValidationError::InvalidDateTime { .. })
                ),
                "{input}"
            );
        }
        assert!(to_unix_seconds("1969-12-31T23:59:59", &Utc).is_err());
        assert_eq!(to_unix_seconds("1970-01-01T00:00:00", &Utc), Ok(0));
    }

    #[test]
    fn composes_reference_payment() {
        let target = Address::repeat_byte(0xe2);
        let request = TransactionComposer::new()
            .compose(target, U256::from(10_000_000_000_000_000u64), &scenario_intent())
            .expect("valid intent");

        assert_eq!(request.execute_at, 1_735_689_600);
        assert_eq!(request.recipient, Address::repeat_byte(0xaa));
        assert_eq!(request.amount, U256::from(1_500_000_000_000_000_000u64));
        assert_eq!(request.fee, U256::from(10_000_000_000_000_000u64));
        assert_eq!(request.total_value, U256::from(1_510_000_000_000_000_000u64));

        let payload = ISender::sendEthAtTimeCall::abi_decode(&request.payload).unwrap();
        assert_eq!(payload.callTime, U256::from(1_735_689_600u64));
        assert_eq!(payload.recipient, Address::repeat_byte(0xaa));

        let call = request.registry_call().unwrap();
        assert_eq!(call.target, target);
        assert_eq!(call.referer, Address::ZERO);
        assert_eq!(call.callData, request.payload);
        assert_eq!(call.ethForCall, U112::from(1_500_000_000_000_000_000u128));
        assert!(!call.verifyUser);
        assert!(!call.insertFeeAmount);
    }

    #[test]
    fn rejects_invalid_amounts_and_recipients() {
        let composer = TransactionComposer::new();
        let fee = U256::from(1u64);
        let target = Address::repeat_byte(0xe2);
        let compose = |recipient: &str, amount: &str| {
            composer.compose(
                target,
                fee,
                &PaymentIntent::new("2025-01-01T00:00:00", recipient, amount),
            )
        };

        for amount in ["0", "0.0", "", "-1", "1e18", "0.0000000000000000001"] {
            assert!(
                matches!(
                    compose(BOB, amount),
                    Err(ComposeError::Validation(ValidationError::InvalidAmount { .. }))
                ),
                "{amount}"
            );
        }
        // 2^112 wei does not fit the registry's ethForCall field.
        assert!(compose(BOB, "5192296858534827.628530496329220096").is_err());
        assert!(compose(BOB, "5192296858534827.628530496329220095").is_ok());

        for recipient in ["0x1234", "not an address", "0x0000000000000000000000000000000000000000"] {
            assert!(
                matches!(
                    compose(recipient, "1"),
                    Err(ComposeError::Validation(ValidationError::InvalidAddress(_)))
                ),
                "{recipient}"
            );
        }
    }

    #[test]
    fn fee_overflow_is_reported() {
        let err = TransactionComposer::new()
            .compose(Address::repeat_byte(0xe2), U256::MAX, &scenario_intent())
            .unwrap_err();
        assert_eq!(err, ComposeError::ValueOverflow);
        assert!(!err.is_precondition());
    }

    #[tokio::test]
    async fn submits_exactly_one_registry_call() {
        let scenario = DemoScenario::default();
        let mut manager = make_manager(&scenario);
        manager.connect().await.unwrap();

        let submission = TransactionComposer::new()
            .submit(&manager, &scenario_intent())
            .await
            .expect("accepted network");
        let receipt = submission.wait().await.expect("confirmed");
        assert!(receipt.block_number.is_some());

        let sent = scenario.wallet.sent_calls();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, scenario.accounts.alice);
        assert_eq!(sent[0].to, scenario.accounts.registry);
        assert_eq!(sent[0].value, U256::from(1_510_000_000_000_000_000u64));

        let call = IRegistry::newReqCall::abi_decode(&sent[0].input).unwrap();
        assert_eq!(call.target, scenario.accounts.sender);
        assert_eq!(call.ethForCall, U112::from(1_500_000_000_000_000_000u128));
        let payload = ISender::sendEthAtTimeCall::abi_decode(&call.callData).unwrap();
        assert_eq!(payload.callTime, U256::from(1_735_689_600u64));
        assert_eq!(payload.recipient, scenario.accounts.bob);
    }

    #[tokio::test]
    async fn refuses_without_session_or_on_wrong_network() {
        let scenario = DemoScenario::new(1);
        let mut manager = make_manager(&scenario);
        let composer = TransactionComposer::new();

        let err = composer.submit(&manager, &scenario_intent()).await.unwrap_err();
        assert_eq!(err, ComposeError::NotConnected);
        assert!(err.is_precondition());

        manager.connect().await.unwrap();
        let err = composer.submit(&manager, &scenario_intent()).await.unwrap_err();
        assert_eq!(
            err,
            ComposeError::WrongNetwork {
                chain_id: Some(1),
                accepted: 3
            }
        );
        assert!(err.is_precondition());
        assert!(scenario.wallet.sent_calls().is_empty());
    }

    #[tokio::test]
    async fn refuses_without_account_and_after_disconnect() {
        let scenario = DemoScenario::default();
        let mut manager = make_manager(&scenario);
        let composer = TransactionComposer::new();
        manager.connect().await.unwrap();

        scenario.wallet.set_accounts(Vec::new());
        let err = composer.submit(&manager, &scenario_intent()).await.unwrap_err();
        assert_eq!(err, ComposeError::NoAccount);

        scenario.wallet.set_accounts(vec![scenario.accounts.alice]);
        manager.disconnect();
        let err = composer.submit(&manager, &scenario_intent()).await.unwrap_err();
        assert_eq!(err, ComposeError::NotConnected);
        assert!(scenario.wallet.sent_calls().is_empty());
    }

    #[tokio::test]
    async fn invalid_input_aborts_before_sending() {
        let scenario = DemoScenario::default();
        let mut manager = make_manager(&scenario);
        manager.connect().await.unwrap();

        let intent = PaymentIntent::new("tomorrow", BOB, "1.5");
        let err = TransactionComposer::new()
            .submit(&manager, &intent)
            .await
            .unwrap_err();
        assert!(matches!(err, ComposeError::Validation(_)));
        assert!(!err.is_precondition());
        assert!(scenario.wallet.sent_calls().is_empty());
    }

    #[tokio::test]
    async fn provider_rejection_surfaces_as_single_error_signal() {
        let scenario = DemoScenario::default();
        scenario
            .wallet
            .set_submission_outcome(SubmissionOutcome::RejectBeforeMining(
                "user denied transaction signature".into(),
            ));
        let mut manager = make_manager(&scenario);
        manager.connect().await.unwrap();

        let mut submission = TransactionComposer::new()
            .submit(&manager, &scenario_intent())
            .await
            .expect("request composed");
        match submission.next_event().await {
            Some(SubmissionEvent::Error(err)) => {
                assert_eq!(err.reason, "user denied transaction signature")
            }
            other => panic!("expected error signal, got {other:?}"),
        }
        assert_eq!(submission.next_event().await, None);
    }
}
