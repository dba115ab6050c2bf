//! Scripts for deploying, upgrading and verifying the agent NFT contracts
//! behind beacon proxies.

#![deny(missing_docs)]
#![deny(clippy::missing_docs_in_private_items)]

pub mod artifacts;
pub mod beacon;
pub mod chain;
pub mod cli;
mod commands;
pub mod config;
pub mod constants;
pub mod deploy;
pub mod deployments;
pub mod errors;
pub mod mint;
pub mod safety;
mod solidity;
pub mod types;
pub mod upgrade;
pub mod verify;

#[cfg(test)]
mod test_utils;
