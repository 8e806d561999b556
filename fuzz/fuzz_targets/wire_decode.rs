#![no_main]

use libfuzzer_sys::fuzz_target;
use tai_core::contracts::{market, oracle, staking, supply, unlock, vesting};
use tai_core::wire::{parse_bounce, Payout, WireMessage};
use tai_core::AnyCommand;

fn check<T: WireMessage + PartialEq + std::fmt::Debug>(data: &[u8]) {
    // Whatever decodes must re-encode to the exact input.
    if let Ok(msg) = T::decode(data) {
        assert_eq!(msg.encode(), data);
    }
}

fuzz_target!(|data: &[u8]| {
    check::<oracle::Command>(data);
    check::<unlock::Command>(data);
    check::<staking::Command>(data);
    check::<market::Command>(data);
    check::<supply::Command>(data);
    check::<vesting::Command>(data);
    check::<Payout>(data);

    if let Ok(cmd) = AnyCommand::decode(data) {
        assert_eq!(cmd.encode(), data);
    }
    if let Some((_, original)) = parse_bounce(data) {
        let _ = AnyCommand::decode(original);
    }
});
