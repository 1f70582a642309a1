//! Submission-input validation.
//!
//! Runs at the HTTP boundary before any job is enqueued or any event is
//! recorded; a rejected submission leaves no trace in the system.

use rust_decimal::Decimal;

use crate::domain::SubmitOrderRequest;
use crate::error::{Result, SwaplineError};

/// Validate a swap submission: both tokens present and distinct,
/// amount strictly positive, slippage (when given) in [0, 1).
pub fn validate_submission(request: &SubmitOrderRequest) -> Result<()> {
    if request.token_in.trim().is_empty() || request.token_out.trim().is_empty() {
        return Err(SwaplineError::Validation(
            "tokenIn, tokenOut, amount required".to_string(),
        ));
    }

    if request.token_in.eq_ignore_ascii_case(&request.token_out) {
        return Err(SwaplineError::Validation(format!(
            "tokenIn and tokenOut must differ: {}",
            request.token_in
        )));
    }

    if request.amount <= Decimal::ZERO {
        return Err(SwaplineError::Validation(format!(
            "amount must be positive: {}",
            request.amount
        )));
    }

    if let Some(slippage) = request.slippage {
        if slippage < Decimal::ZERO || slippage >= Decimal::ONE {
            return Err(SwaplineError::Validation(format!(
                "slippage must be in [0, 1): {slippage}"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(token_in: &str, token_out: &str, amount: Decimal) -> SubmitOrderRequest {
        SubmitOrderRequest {
            token_in: token_in.into(),
            token_out: token_out.into(),
            amount,
            slippage: None,
        }
    }

    #[test]
    fn accepts_a_valid_submission() {
        assert!(validate_submission(&request("SOL", "USDC", dec!(2))).is_ok());
    }

    #[test]
    fn rejects_identical_tokens() {
        let err = validate_submission(&request("SOL", "sol", dec!(2))).expect_err("must reject");
        assert!(matches!(err, SwaplineError::Validation(_)));
    }

    #[test]
    fn rejects_non_positive_amounts() {
        assert!(validate_submission(&request("SOL", "USDC", dec!(0))).is_err());
        assert!(validate_submission(&request("SOL", "USDC", dec!(-1))).is_err());
    }

    #[test]
    fn rejects_blank_tokens() {
        assert!(validate_submission(&request("", "USDC", dec!(1))).is_err());
        assert!(validate_submission(&request("SOL", "  ", dec!(1))).is_err());
    }

    #[test]
    fn rejects_out_of_range_slippage() {
        let mut req = request("SOL", "USDC", dec!(1));
        req.slippage = Some(dec!(1.5));
        assert!(validate_submission(&req).is_err());
        req.slippage = Some(dec!(0.05));
        assert!(validate_submission(&req).is_ok());
    }
}
