//! Reusable ceremony assertions.

#![allow(dead_code)]

use heartbeat_por::Proof;

use super::fixtures::{memory_file, CeremonySetup};

/// Drive challenge → prove → verify over the setup's own data and assert the
/// proof checks out. The server side runs on the public engine.
pub fn assert_ceremony_succeeds(setup: &mut CeremonySetup) {
    let pair = prove_over(setup, None);
    assert_verifies(setup, &pair, true);
}

/// Issue a fresh challenge and answer it over `data` (defaulting to the
/// setup's own bytes). Returns the challenge/proof pair for the verifier.
pub fn prove_over(setup: &mut CeremonySetup, data: Option<&[u8]>) -> (heartbeat_por::Challenge, Proof) {
    let challenge = setup
        .heartbeat
        .gen_challenge_with_rng(&setup.state, &mut setup.rng)
        .expect("state authenticates");

    let server = setup.heartbeat.public();
    let bytes = data.unwrap_or(&setup.data);
    let mut file = memory_file(bytes);
    let proof = server
        .prove(&mut file, &challenge, &setup.tag)
        .expect("prove succeeds");
    (challenge, proof)
}

/// Assert the verifier's verdict for a (challenge, proof) pair.
pub fn assert_verifies(
    setup: &CeremonySetup,
    pair: &(heartbeat_por::Challenge, Proof),
    expected: bool,
) {
    let (challenge, proof) = pair;
    let verdict = setup
        .heartbeat
        .verify(proof, challenge, &setup.state)
        .expect("verify runs to completion");
    assert_eq!(verdict, expected);
}
