//! Virtual pet client: the action dispatcher, pet state derived from the
//! synced store, and the wiring used by the `tamagotchi` binary.

pub mod app;
pub mod pet;
pub mod provider;
pub mod system_calls;
pub mod wallets;

pub use app::{
    App,
    AppConfig,
    SignerSource,
};
pub use pet::{
    PetSnapshot,
    PetState,
};
pub use provider::{
    DojoProvider,
    Signer,
    StarknetSigner,
    TransactionError,
    TransactionResult,
};
pub use system_calls::SystemCalls;

#[cfg(test)]
pub(crate) mod test_support;
