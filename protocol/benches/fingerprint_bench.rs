// Fingerprint and payload-signature benchmarks for CertiChain.
//
// Covers fingerprint derivation across identifier lengths, transaction
// signing-message construction, and RSA-PSS verification at the key sizes
// issuers actually use.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::RsaPrivateKey;

use certichain_protocol::crypto::fingerprint::{FingerprintDeriver, FingerprintSalt};
use certichain_protocol::crypto::keys::LedgerKeypair;
use certichain_protocol::crypto::signatures::{sign_payload, verify_signature};
use certichain_protocol::ledger::{EntryArg, LedgerSigner, UnsignedTransaction};

fn bench_fingerprint(c: &mut Criterion) {
    let deriver =
        FingerprintDeriver::new(FingerprintSalt::new(b"bench-salt-0123456789".to_vec()).unwrap());
    let mut group = c.benchmark_group("fingerprint/derive");

    for len in [24usize, 36, 256] {
        let id = "x".repeat(len);
        group.throughput(Throughput::Bytes(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &id, |b, id| {
            b.iter(|| deriver.derive(id).unwrap());
        });
    }
    group.finish();
}

fn bench_sign_transaction(c: &mut Criterion) {
    let signer = LedgerSigner::new(LedgerKeypair::generate());
    let sender = signer.address();
    let args: Vec<EntryArg> = (0..9).map(|i| EntryArg::from(format!("field-{i}"))).collect();

    c.bench_function("ledger/sign_issue_cert", |b| {
        b.iter(|| {
            let tx = UnsignedTransaction::new(
                sender,
                42,
                "0x1::CertManagement::issue_cert".parse().unwrap(),
                args.clone(),
            );
            signer.sign(tx)
        });
    });
}

fn bench_verify_payload(c: &mut Criterion) {
    let payload = br#"{"certificateId":"CERT-1","recipientName":"Ada Lovelace"}"#;
    let mut group = c.benchmark_group("rsa_pss/verify");
    group.sample_size(20);

    for bits in [2048usize, 4096] {
        let private = RsaPrivateKey::new(&mut OsRng, bits).unwrap();
        let private_pem = private.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        let public_pem = private
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        let signature = sign_payload(&private_pem, payload).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(bits), &bits, |b, _| {
            b.iter(|| assert!(verify_signature(payload, &signature, &public_pem)));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_fingerprint,
    bench_sign_transaction,
    bench_verify_payload
);
criterion_main!(benches);
