//! # openlance-settlement — Settlement Ledger Gateway
//!
//! The bridge between the marketplace core and its EVM-style settlement
//! ledger. The core never holds private keys: mutations follow a two-phase
//! protocol where the server builds an [`UnsignedInstruction`], the client
//! signs and broadcasts it with their own wallet, and the server later
//! verifies the broadcast transaction reached finality before applying the
//! local state change.
//!
//! - [`instruction`] — escrow contract calldata builders
//! - [`gateway`] — the [`SettlementGateway`] seam and [`TxFinality`]
//! - [`rpc`] — production JSON-RPC gateway with bounded finality polling
//! - [`mock`] — scriptable in-memory gateway for tests

pub mod error;
pub mod gateway;
pub mod instruction;
pub mod mock;
pub mod rpc;

pub use error::SettlementError;
pub use gateway::{SettlementGateway, TxFinality};
pub use instruction::{SettlementAction, UnsignedInstruction};
pub use mock::MockSettlementGateway;
pub use rpc::{JsonRpcGateway, SettlementConfig};
