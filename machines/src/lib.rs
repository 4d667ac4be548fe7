//! Reference boards built on `marquee-core` and the registry the runner
//! discovers them through.

pub mod bank_switch;
pub mod registry;
pub mod sound_latch;

pub use bank_switch::BankSwitchSystem;
pub use sound_latch::SoundLatchSystem;
