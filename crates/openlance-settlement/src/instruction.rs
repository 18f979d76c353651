//! # Escrow Contract Instructions
//!
//! Builds the unsigned transactions the client's wallet signs and
//! broadcasts. The server constructs calldata only; it never sees a private
//! key and never broadcasts anything itself.
//!
//! ## Contract Interface
//!
//! The escrow contract exposes one function per marketplace mutation:
//!
//! ```solidity
//! function createEscrow(bytes16 jobId, bytes16 client, bytes16 worker) external;
//! function fundEscrow(bytes16 jobId) external payable;
//! function releaseMilestone(bytes16 jobId, uint256 index) external;
//! function raiseDispute(bytes16 jobId, bytes16 raisedBy) external;
//! function castVote(uint256 disputeId, bytes16 voter, bool favorWorker) external;
//! function resolveDispute(uint256 disputeId) external;
//! ```
//!
//! Calldata is the 4-byte function selector followed by 32-byte ABI words;
//! `bytes16` identifiers are left-aligned in their word, integers and bools
//! right-aligned.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use openlance_core::{JobId, UserId};

use crate::error::SettlementError;

/// 4-byte selector for `createEscrow(bytes16,bytes16,bytes16)`.
const CREATE_ESCROW_SELECTOR: &str = "3f1a4b7c";
/// 4-byte selector for `fundEscrow(bytes16)`.
const FUND_ESCROW_SELECTOR: &str = "b9d35e21";
/// 4-byte selector for `releaseMilestone(bytes16,uint256)`.
const RELEASE_MILESTONE_SELECTOR: &str = "7c64a1f0";
/// 4-byte selector for `raiseDispute(bytes16,bytes16)`.
const RAISE_DISPUTE_SELECTOR: &str = "e4528a9d";
/// 4-byte selector for `castVote(uint256,bytes16,bool)`.
const CAST_VOTE_SELECTOR: &str = "51c0e3b8";
/// 4-byte selector for `resolveDispute(uint256)`.
const RESOLVE_DISPUTE_SELECTOR: &str = "29f7d604";

/// A marketplace mutation expressed as an escrow contract call.
///
/// Each variant carries exactly the arguments its contract function takes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementAction {
    /// Create the escrow account for a job.
    CreateEscrow {
        /// The job the escrow belongs to.
        job_id: JobId,
        /// The funding client.
        client: UserId,
        /// The assigned worker.
        worker: UserId,
    },
    /// Deposit the full job amount into the escrow.
    FundEscrow {
        /// The job whose escrow is funded.
        job_id: JobId,
    },
    /// Release one milestone's funds to the worker.
    ReleaseMilestone {
        /// The job whose escrow is drawn down.
        job_id: JobId,
        /// On-ledger milestone index.
        milestone_index: u64,
    },
    /// Open a dispute on the ledger.
    RaiseDispute {
        /// The disputed job.
        job_id: JobId,
        /// The party raising the dispute.
        raised_by: UserId,
    },
    /// Record a community vote on the ledger.
    CastVote {
        /// Ledger-assigned dispute reference.
        on_chain_dispute_id: u64,
        /// The voting community member.
        voter: UserId,
        /// Whether the vote supports the worker.
        favor_worker: bool,
    },
    /// Finalize a dispute on the ledger.
    ResolveDispute {
        /// Ledger-assigned dispute reference.
        on_chain_dispute_id: u64,
    },
}

impl SettlementAction {
    /// Encode this action as `0x`-prefixed escrow contract calldata.
    pub fn calldata(&self) -> String {
        match self {
            Self::CreateEscrow {
                job_id,
                client,
                worker,
            } => format!(
                "0x{CREATE_ESCROW_SELECTOR}{}{}{}",
                uuid_word(job_id.as_uuid()),
                uuid_word(client.as_uuid()),
                uuid_word(worker.as_uuid()),
            ),
            Self::FundEscrow { job_id } => {
                format!("0x{FUND_ESCROW_SELECTOR}{}", uuid_word(job_id.as_uuid()))
            }
            Self::ReleaseMilestone {
                job_id,
                milestone_index,
            } => format!(
                "0x{RELEASE_MILESTONE_SELECTOR}{}{}",
                uuid_word(job_id.as_uuid()),
                uint_word(*milestone_index),
            ),
            Self::RaiseDispute { job_id, raised_by } => format!(
                "0x{RAISE_DISPUTE_SELECTOR}{}{}",
                uuid_word(job_id.as_uuid()),
                uuid_word(raised_by.as_uuid()),
            ),
            Self::CastVote {
                on_chain_dispute_id,
                voter,
                favor_worker,
            } => format!(
                "0x{CAST_VOTE_SELECTOR}{}{}{}",
                uint_word(*on_chain_dispute_id),
                uuid_word(voter.as_uuid()),
                uint_word(u64::from(*favor_worker)),
            ),
            Self::ResolveDispute {
                on_chain_dispute_id,
            } => format!(
                "0x{RESOLVE_DISPUTE_SELECTOR}{}",
                uint_word(*on_chain_dispute_id),
            ),
        }
    }

    /// Short human-readable label for logs and instruction payloads.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CreateEscrow { .. } => "create_escrow",
            Self::FundEscrow { .. } => "fund_escrow",
            Self::ReleaseMilestone { .. } => "release_milestone",
            Self::RaiseDispute { .. } => "raise_dispute",
            Self::CastVote { .. } => "cast_vote",
            Self::ResolveDispute { .. } => "resolve_dispute",
        }
    }
}

/// An unsigned transaction for the client's wallet to sign and broadcast.
///
/// The server never signs; it only describes the call. `value` is a decimal
/// string of native-token wei for payable calls, "0" otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UnsignedInstruction {
    /// Escrow contract address the transaction targets.
    pub to: String,
    /// `0x`-prefixed ABI calldata.
    pub data: String,
    /// Native-token value to attach, as a decimal string.
    pub value: String,
    /// EVM chain the transaction must be broadcast on.
    pub chain_id: u64,
    /// Which contract call this encodes (e.g., "raise_dispute").
    pub action: String,
}

impl UnsignedInstruction {
    /// Build an instruction targeting the given escrow contract.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidAddress`] when the contract address
    /// is malformed.
    pub fn build(
        action: &SettlementAction,
        contract_address: &str,
        chain_id: u64,
    ) -> Result<Self, SettlementError> {
        if !is_valid_eth_address(contract_address) {
            return Err(SettlementError::InvalidAddress(
                contract_address.to_string(),
            ));
        }
        Ok(Self {
            to: contract_address.to_string(),
            data: action.calldata(),
            value: "0".to_string(),
            chain_id,
            action: action.label().to_string(),
        })
    }
}

/// Encode a UUID as a 32-byte ABI word (`bytes16`, left-aligned).
fn uuid_word(id: &Uuid) -> String {
    let mut word = String::with_capacity(64);
    for b in id.as_bytes() {
        word.push_str(&format!("{b:02x}"));
    }
    word.push_str(&"0".repeat(32));
    word
}

/// Encode a u64 as a 32-byte ABI word (`uint256`, right-aligned).
fn uint_word(v: u64) -> String {
    format!("{v:064x}")
}

/// Validate that a string is a well-formed EVM address (0x + 40 hex chars).
pub fn is_valid_eth_address(addr: &str) -> bool {
    addr.len() == 42
        && addr.starts_with("0x")
        && addr[2..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = "0x00000000000000000000000000000000000000aa";

    #[test]
    fn valid_eth_addresses() {
        assert!(is_valid_eth_address(
            "0x0000000000000000000000000000000000000000"
        ));
        assert!(is_valid_eth_address(
            "0xAbCdEf0123456789AbCdEf0123456789AbCdEf01"
        ));
    }

    #[test]
    fn invalid_eth_addresses() {
        assert!(!is_valid_eth_address(""));
        assert!(!is_valid_eth_address("0x"));
        assert!(!is_valid_eth_address("0x123"));
        assert!(!is_valid_eth_address(
            "0xGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG"
        ));
    }

    #[test]
    fn create_escrow_calldata_shape() {
        let action = SettlementAction::CreateEscrow {
            job_id: JobId::new(),
            client: UserId::new(),
            worker: UserId::new(),
        };
        let data = action.calldata();
        // 0x + 8 hex (selector) + 3 × 64 hex (words).
        assert_eq!(data.len(), 2 + 8 + 3 * 64);
        assert!(data.starts_with(&format!("0x{CREATE_ESCROW_SELECTOR}")));
    }

    #[test]
    fn cast_vote_encodes_bool_in_last_word() {
        let action = SettlementAction::CastVote {
            on_chain_dispute_id: 7,
            voter: UserId::new(),
            favor_worker: true,
        };
        let data = action.calldata();
        assert_eq!(data.len(), 2 + 8 + 3 * 64);
        assert!(data.ends_with(&format!("{:064x}", 1)));

        let action = SettlementAction::CastVote {
            on_chain_dispute_id: 7,
            voter: UserId::new(),
            favor_worker: false,
        };
        assert!(action.calldata().ends_with(&"0".repeat(64)));
    }

    #[test]
    fn resolve_dispute_encodes_id() {
        let action = SettlementAction::ResolveDispute {
            on_chain_dispute_id: 0x2a,
        };
        let data = action.calldata();
        assert_eq!(data.len(), 2 + 8 + 64);
        assert!(data.ends_with("2a"));
    }

    #[test]
    fn uuid_word_is_left_aligned() {
        let id = Uuid::new_v4();
        let word = uuid_word(&id);
        assert_eq!(word.len(), 64);
        assert!(word.ends_with(&"0".repeat(32)));
    }

    #[test]
    fn instruction_build_validates_address() {
        let action = SettlementAction::FundEscrow {
            job_id: JobId::new(),
        };
        assert!(matches!(
            UnsignedInstruction::build(&action, "not-an-address", 1),
            Err(SettlementError::InvalidAddress(_))
        ));

        let instr = UnsignedInstruction::build(&action, CONTRACT, 8453).unwrap();
        assert_eq!(instr.to, CONTRACT);
        assert_eq!(instr.chain_id, 8453);
        assert_eq!(instr.value, "0");
        assert_eq!(instr.action, "fund_escrow");
    }

    #[test]
    fn each_action_has_distinct_selector() {
        let job_id = JobId::new();
        let user = UserId::new();
        let actions = [
            SettlementAction::CreateEscrow {
                job_id,
                client: user,
                worker: user,
            },
            SettlementAction::FundEscrow { job_id },
            SettlementAction::ReleaseMilestone {
                job_id,
                milestone_index: 0,
            },
            SettlementAction::RaiseDispute {
                job_id,
                raised_by: user,
            },
            SettlementAction::CastVote {
                on_chain_dispute_id: 0,
                voter: user,
                favor_worker: true,
            },
            SettlementAction::ResolveDispute {
                on_chain_dispute_id: 0,
            },
        ];
        let mut selectors: Vec<String> = actions
            .iter()
            .map(|a| a.calldata()[2..10].to_string())
            .collect();
        selectors.sort();
        selectors.dedup();
        assert_eq!(selectors.len(), actions.len());
    }
}
