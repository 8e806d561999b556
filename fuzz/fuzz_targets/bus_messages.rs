#![no_main]

use libfuzzer_sys::fuzz_target;
use tai_core::{Address, Deployment, Funds, TaiConfig};

// Each input is split into messages: [target:u8][len:u8][body...], sent from a funded wallet.
fuzz_target!(|data: &[u8]| {
    let d = Deployment::labelled();
    let Ok(mut bus) = d.deploy(&TaiConfig::default()) else {
        return;
    };
    let sender = Address::from_label("fuzzer");
    if bus.mint(sender, Funds { native: 1_000_000, tai: 1_000_000 }).is_err() {
        return;
    }

    let targets = [d.oracle, d.unlock, d.staking, d.market, d.supply, d.vesting];
    let mut rest = data;
    while rest.len() >= 2 {
        let to = targets[rest[0] as usize % targets.len()];
        let len = (rest[1] as usize).min(rest.len() - 2);
        let body = rest[2..2 + len].to_vec();
        rest = &rest[2 + len..];

        let value = Funds::tai(u128::from(len as u8) * 10);
        if !bus.balance(&sender).covers(&value) {
            break;
        }
        bus.send_external(sender, to, value, body).expect("funded send");
        bus.run_until_idle().expect("bus drains");
        bus.advance(3_600);
        bus.check_conservation().expect("value conserved");
    }
});
