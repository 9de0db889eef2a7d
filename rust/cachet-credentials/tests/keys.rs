use cachet_credentials::{InvalidSignature, KeyError, KeyPair, PublicKey, Signature};
use testresult::TestResult;

#[test]
fn it_signs_and_verifies() -> TestResult {
    let pair = KeyPair::generate()?;
    let signature = pair.sign(b"block payload");

    pair.public().verify(b"block payload", &signature)?;
    assert_eq!(
        pair.public().verify(b"other payload", &signature),
        Err(InvalidSignature)
    );
    Ok(())
}

#[test]
fn it_rejects_a_signature_from_another_key() -> TestResult {
    let signer = KeyPair::from_seed(&[1; 32]);
    let other = KeyPair::from_seed(&[2; 32]);
    let signature = signer.sign(b"payload");

    assert!(other.public().verify(b"payload", &signature).is_err());
    Ok(())
}

#[test]
fn it_rejects_a_tampered_signature() {
    let pair = KeyPair::from_seed(&[3; 32]);
    let mut bytes = pair.sign(b"payload").to_bytes();
    bytes[10] ^= 0x01;

    assert!(
        pair.public()
            .verify(b"payload", &Signature::from_bytes(bytes))
            .is_err()
    );
}

#[test]
fn public_keys_round_trip_through_did_key() -> TestResult {
    let public = KeyPair::from_seed(&[4; 32]).public();
    let text = public.to_string();

    assert!(text.starts_with("did:key:z6Mk"));
    assert_eq!(text.parse::<PublicKey>()?, public);
    Ok(())
}

#[test]
fn it_rejects_malformed_did_keys() {
    for text in ["did:web:example.com", "did:key:6Mk", "did:key:z0OIl"] {
        assert!(matches!(
            text.parse::<PublicKey>(),
            Err(KeyError::Encoding(_))
        ));
    }
}

#[test]
fn keys_and_signatures_serialize_as_bytes() -> TestResult {
    let pair = KeyPair::from_seed(&[5; 32]);
    let signature = pair.sign(b"payload");

    let encoded = serde_ipld_dagcbor::to_vec(&(pair.public(), signature))?;
    let (public, decoded): (PublicKey, Signature) = serde_ipld_dagcbor::from_slice(&encoded)?;

    assert_eq!(public, pair.public());
    assert_eq!(decoded, signature);
    Ok(())
}
