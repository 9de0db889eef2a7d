use cachet_token::{BlockBuilder, Error, ErrorKind, KeyPair, Proof, Token};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use testresult::TestResult;

fn pair(seed: u8) -> KeyPair {
    KeyPair::from_seed(&[seed; 32])
}

/// An authority block plus two attenuations, signed with fixed keys.
fn three_blocks() -> Result<Token, Error> {
    Token::issue(
        &pair(1),
        BlockBuilder::new().code(r#"user("admin"); right("file1", "read")"#)?,
        pair(2),
    )?
    .append(
        BlockBuilder::new()
            .code(r#"check if operation("read") or operation("list")"#)?
            .context("read or list"),
        pair(3),
    )?
    .append(
        BlockBuilder::new().code(r#"check if time($t), $t < 2030-01-01T00:00:00Z"#)?,
        pair(4),
    )
}

#[test_log::test]
fn it_round_trips_through_bytes() -> TestResult {
    let token = three_blocks()?;
    let decoded = Token::from_slice(&token.to_vec()?)?;

    assert_eq!(decoded, token);
    decoded.verify(&pair(1).public())?;
    assert_eq!(decoded.identifiers(), token.identifiers());
    Ok(())
}

#[test_log::test]
fn it_round_trips_through_base64() -> TestResult {
    let token = three_blocks()?.seal();
    let text = token.to_base64()?;

    assert!(!text.contains('+') && !text.contains('/'));
    let decoded = Token::from_base64(&text)?;
    assert_eq!(decoded, token);
    assert!(decoded.is_sealed());
    decoded.verify(&pair(1).public())?;
    Ok(())
}

#[test_log::test]
fn it_refuses_to_append_to_a_sealed_token() -> TestResult {
    let sealed = three_blocks()?.seal();
    let error = sealed
        .append(BlockBuilder::new(), pair(9))
        .expect_err("sealed tokens cannot be attenuated");

    assert_eq!(error.kind(), ErrorKind::Sealed);
    Ok(())
}

#[test_log::test]
fn sealing_survives_serialization() -> TestResult {
    let sealed = three_blocks()?.seal();
    let decoded = Token::from_slice(&sealed.to_vec()?)?;

    assert!(matches!(decoded.proof(), Proof::Sealed(_)));
    assert!(matches!(
        decoded.append(BlockBuilder::new(), pair(9)),
        Err(Error::Sealed)
    ));
    Ok(())
}

#[test_log::test]
fn a_single_block_token_verifies_against_the_root() -> TestResult {
    let token = Token::issue(&pair(1), BlockBuilder::new(), pair(2))?;
    token.verify(&pair(1).public())?;

    let error = token
        .verify(&pair(2).public())
        .expect_err("the next key is not the root");
    assert_eq!(error.kind(), ErrorKind::InvalidSignature);
    Ok(())
}

#[test_log::test]
fn it_rejects_truncated_and_padded_bytes() -> TestResult {
    let bytes = three_blocks()?.to_vec()?;

    for candidate in [
        Vec::new(),
        bytes[..bytes.len() / 2].to_vec(),
        bytes[..bytes.len() - 1].to_vec(),
        [bytes.as_slice(), &[0x00u8][..]].concat(),
    ] {
        let error = Token::from_slice(&candidate).expect_err("corrupt bytes must not decode");
        assert_eq!(error.kind(), ErrorKind::Malformed);
    }
    Ok(())
}

#[test_log::test]
fn it_rejects_text_that_is_not_base64() {
    let error = Token::from_base64("not a token!").expect_err("invalid base64");
    assert_eq!(error.kind(), ErrorKind::Malformed);
}

#[test_log::test]
fn it_prints_every_block() -> TestResult {
    let token = three_blocks()?.seal();
    let printed = token.to_string();

    assert!(printed.contains("// block 0"));
    assert!(printed.contains("// block 2"));
    assert!(printed.contains("// context: read or list"));
    assert!(printed.contains(r#"check if operation("read") or operation("list");"#));
    assert!(printed.contains(&format!("// identifier: {}", token.identifiers()[0])));
    assert!(printed.ends_with("// sealed\n"));
    Ok(())
}

#[test_log::test]
fn attenuating_requires_no_root_key() -> TestResult {
    let issued = Token::issue(&pair(1), BlockBuilder::new(), pair(2))?;
    let received = Token::from_slice(&issued.to_vec()?)?;

    let attenuated = received.append(
        BlockBuilder::new().code(r#"check if operation("read")"#)?,
        KeyPair::generate()?,
    )?;
    attenuated.verify(&pair(1).public())?;
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn flipping_a_signature_bit_fails_at_that_block(
        block in 0usize..3,
        offset in 0usize..64,
        bit in 0u8..8,
    ) {
        let token = three_blocks().unwrap();
        let mut bytes = token.to_vec().unwrap();
        let signature = token.blocks()[block].signature().to_bytes();
        let start = bytes
            .windows(signature.len())
            .position(|window| window == signature)
            .unwrap();
        bytes[start + offset] ^= 1 << bit;

        let tampered = Token::from_slice(&bytes).unwrap();
        match tampered.verify(&pair(1).public()) {
            Err(Error::InvalidSignature { index }) => prop_assert_eq!(index, block),
            other => prop_assert!(false, "unexpected verification result: {:?}", other),
        }
    }
}
