//! Lending protocol contract interfaces.
//!
//! ABI subsets for the pool (account data + user-facing actions), the
//! protocol data provider (per-reserve debt), and the interest-bearing token
//! `transfer` entry point.

use alloy::sol;
use alloy::sol_types::SolCall;

sol! {
    /// Lending pool interface (subset for health reads and action decoding).
    #[sol(rpc)]
    interface ILendingPool {
        function getUserAccountData(address user) external view returns (
            uint256 totalCollateralBase,
            uint256 totalDebtBase,
            uint256 availableBorrowsBase,
            uint256 currentLiquidationThreshold,
            uint256 ltv,
            uint256 healthFactor
        );

        function deposit(address asset, uint256 amount, address onBehalfOf, uint16 referralCode) external;
        function supply(address asset, uint256 amount, address onBehalfOf, uint16 referralCode) external;
        function withdraw(address asset, uint256 amount, address to) external returns (uint256);
        function borrow(address asset, uint256 amount, uint256 interestRateMode, uint16 referralCode, address onBehalfOf) external;
        function repay(address asset, uint256 amount, uint256 interestRateMode, address onBehalfOf) external returns (uint256);
    }
}

sol! {
    /// Protocol data provider interface (per-user reserve breakdown).
    #[sol(rpc)]
    interface IProtocolDataProvider {
        function getUserReserveData(address asset, address user) external view returns (
            uint256 currentATokenBalance,
            uint256 currentStableDebt,
            uint256 currentVariableDebt,
            uint256 principalStableDebt,
            uint256 scaledVariableDebt,
            uint256 stableBorrowRate,
            uint256 liquidityRate,
            uint40 stableRateLastUpdated,
            bool usageAsCollateralEnabled
        );
    }
}

sol! {
    /// Interest-bearing token transfer (moves collateral between accounts).
    interface IATokenTransfer {
        function transfer(address to, uint256 amount) external returns (bool);
    }
}

/// User-facing protocol action recognised from a call's leading selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserAction {
    Supply,
    Withdraw,
    Borrow,
    Repay,
    Transfer,
}

/// Selector table. `deposit` is the pre-`supply` name of the same action.
const ACTION_SELECTORS: [([u8; 4], UserAction); 6] = [
    (ILendingPool::depositCall::SELECTOR, UserAction::Supply),
    (ILendingPool::supplyCall::SELECTOR, UserAction::Supply),
    (ILendingPool::withdrawCall::SELECTOR, UserAction::Withdraw),
    (ILendingPool::borrowCall::SELECTOR, UserAction::Borrow),
    (ILendingPool::repayCall::SELECTOR, UserAction::Repay),
    (IATokenTransfer::transferCall::SELECTOR, UserAction::Transfer),
];

impl UserAction {
    /// Match a 4-byte function selector.
    pub fn from_selector(selector: [u8; 4]) -> Option<Self> {
        ACTION_SELECTORS
            .iter()
            .find(|(known, _)| *known == selector)
            .map(|(_, action)| *action)
    }

    /// Match the leading selector of raw calldata. Returns `None` for
    /// calldata shorter than four bytes.
    pub fn from_calldata(input: &[u8]) -> Option<Self> {
        let selector: [u8; 4] = input.get(..4)?.try_into().ok()?;
        Self::from_selector(selector)
    }

    /// Action name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Supply => "supply",
            Self::Withdraw => "withdraw",
            Self::Borrow => "borrow",
            Self::Repay => "repay",
            Self::Transfer => "transfer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, U256};

    #[test]
    fn test_known_selectors() {
        // supply(address,uint256,address,uint16)
        assert_eq!(
            UserAction::from_selector([0x61, 0x7b, 0xa0, 0x37]),
            Some(UserAction::Supply)
        );
        // transfer(address,uint256)
        assert_eq!(
            UserAction::from_selector([0xa9, 0x05, 0x9c, 0xbb]),
            Some(UserAction::Transfer)
        );
        // approve(address,uint256) is not a position-changing action
        assert_eq!(UserAction::from_selector([0x09, 0x5e, 0xa7, 0xb3]), None);
    }

    #[test]
    fn test_from_encoded_calldata() {
        let call = ILendingPool::borrowCall {
            asset: Address::repeat_byte(1),
            amount: U256::from(1000u64),
            interestRateMode: U256::from(2u8),
            referralCode: 0,
            onBehalfOf: Address::repeat_byte(2),
        };
        let encoded = call.abi_encode();
        assert_eq!(UserAction::from_calldata(&encoded), Some(UserAction::Borrow));
    }

    #[test]
    fn test_short_calldata() {
        assert_eq!(UserAction::from_calldata(&[]), None);
        assert_eq!(UserAction::from_calldata(&[0x61, 0x7b, 0xa0]), None);
    }
}
