// Deflate compatibility self-check.
//
// Divination only works if this runtime's deflate reproduces historical output
// exactly. The window compresses a fixed corpus under all 38 distinguishable
// settings and compares SHA-256 fingerprints with values recorded on a
// known-good system (stock zlib; unchanged from 1.2.x through 1.3.x).

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use super::compressor::Deflater;
use super::{DeflateError, DeflateParameters};

/// Fingerprints of `corpus()` compressed under every observable setting.
/// Key: (level, strategy, nowrap).
const BASELINE: [((u8, u8, bool), &str); 38] = [
    ((1, 0, true), "bd6474bcc0cdaa60987e7d6735d9dc18eaca19b300d4ce1b25fe5f4619ac0d2c"),
    ((2, 0, true), "7e7838c002957f30b520e887a1b064c64ebfac9c86bb0c9ccf2de13102b633af"),
    ((3, 0, true), "9e18d923abecfeb41a1ef019b84df95e303fc294185f5cab1d9db998eb44502c"),
    ((4, 0, true), "57e44aeb8c3c1792d6ceb40e4c28a3ca6c39e05500b637dd5a1f4eea4abf143d"),
    ((5, 0, true), "3290671020148b2a89816a6f75f9077d0f46ec592d9a98cee3c163396ea5c515"),
    ((6, 0, true), "4740b1b28a0911801bf7b8a9d6054d9e477071f53a4972ef66173fe664f61d6f"),
    ((7, 0, true), "8deae18a4632b4b693de7a24f187e2e2f42ab4e67b35f2aaf04fb9b64c851cb7"),
    ((8, 0, true), "38b7b40ba2b99c4647fd641564121f4709cbe80e794db730dc4927e4f56c45ae"),
    ((9, 0, true), "d01e8ec223792b7a64b96a1f187cc3ba376ce659336c1f11fb1fea83622005de"),
    ((1, 1, true), "bd6474bcc0cdaa60987e7d6735d9dc18eaca19b300d4ce1b25fe5f4619ac0d2c"),
    ((2, 1, true), "7e7838c002957f30b520e887a1b064c64ebfac9c86bb0c9ccf2de13102b633af"),
    ((3, 1, true), "9e18d923abecfeb41a1ef019b84df95e303fc294185f5cab1d9db998eb44502c"),
    ((4, 1, true), "0b2f9987aab4aa4c46beeb3061912be3a4d810d207988f3ccacdcdb2b7b6bf48"),
    ((5, 1, true), "d362153130b06f09f47949d89985fb756d0832b469fff7ae2331f2c306d28721"),
    ((6, 1, true), "f0baa10d43d8fa2cf99fbee81f5cd3b5ea1bf6eda2648ae85259aed9ff53c848"),
    ((7, 1, true), "4b3c95a605fc22a6cf6e18a5d9c300f46039397ebc4459011d9f9ff97c214b93"),
    ((8, 1, true), "e3b5f8380cb727b21649bc5ffc36763bdf9beb945d33afdb272a7b0b3559ddef"),
    ((9, 1, true), "7176816a9585e6348f02428d48a53f191cd24b809b3504c564050c4b0147823f"),
    ((1, 2, true), "f3c43242129b51b02ce61b5755064039ecd63c27fde4abb3fd332b01c9fbfaa1"),
    ((1, 0, false), "cad0ce0e8f0ad2067259913a0d7f375b464bec5a37ece3b57f1e2ccc904914ca"),
    ((2, 0, false), "dc8ad410788a785308cfd566da6c4da70e2480e6d2bd9086173e82120a543074"),
    ((3, 0, false), "7508e0dd71aa1a7384c5d160cbfbce01d0697d4f04b93e01294323449de827a2"),
    ((4, 0, false), "a216fb120fbbd4253e6bb5682ddbf852ba4e39ed07eb41f725c36a3641cb8173"),
    ((5, 0, false), "014ed1ab487c348442930ff1670fc3a7dba71eb1f840e48e106c3123129c0de1"),
    ((6, 0, false), "af70e167ff7b9e5f0112cbc4f2fa6bbf9882c420ee6c64529d8e8203787c67d9"),
    ((7, 0, false), "182104889ded09ef70b7c69e49b02690f9d23ab5b8d0e0762e748847a204c592"),
    ((8, 0, false), "2b8df3f81c06eb2ed312c90b29130717dae1317aa2fc6075e5294c59cda70f1f"),
    ((9, 0, false), "8cf1b6fb7abcb3f27dbcb90febf89d3bf8e73050f97af075bce1cf51892ae06d"),
    ((1, 1, false), "cad0ce0e8f0ad2067259913a0d7f375b464bec5a37ece3b57f1e2ccc904914ca"),
    ((2, 1, false), "dc8ad410788a785308cfd566da6c4da70e2480e6d2bd9086173e82120a543074"),
    ((3, 1, false), "7508e0dd71aa1a7384c5d160cbfbce01d0697d4f04b93e01294323449de827a2"),
    ((4, 1, false), "485b1b8729c73cc2d0dfe73eb1e4b82b9d2edc033c45e1b8b52f2098b9e6c534"),
    ((5, 1, false), "f32ce11c9ff8637c966c296db0c9d62d5ad84d05a0179fd7916bb0594d71b06e"),
    ((6, 1, false), "634875e18c6dbc4568a3305ea78b767d2b8936182cdbd6d64d263ead014adc48"),
    ((7, 1, false), "288e8951dc0362e16425dfc06891e1d860ece60fe1dcf215ac9345b182c3a3c1"),
    ((8, 1, false), "d8d368f84355f5fc2efb42b1cbd3a92f81caaa6516c30e5ec68b6ab5a3638c14"),
    ((9, 1, false), "116aeca221c9d71bea4326ae6f4ed357c2330a31eba53e1251cd5121a639d998"),
    ((1, 2, false), "4f89e17900327b16411f1f431f8c0ba157d40083b78e3f6f1c62b92a8bdfbec0"),
];

const WORDS: [&[u8]; 8] = [
    b"alpha", b"beta", b"gamma", b"delta", b"epsilon", b"zeta", b"eta", b"theta",
];
const SEPARATORS: &[u8; 4] = b" \n,.";

/// The reference payload. Deterministic; a new copy on every call.
///
/// A block of numbered text lines, 4096 pseudo-random words from a small
/// vocabulary (long hash chains separate levels 7, 8 and 9), and runs.
pub fn corpus() -> Vec<u8> {
    let mut out = Vec::with_capacity(28 * 1024);
    for i in 0..64 {
        out.extend_from_slice(format!("{i:04} the quick brown fox jumps over the lazy dog\n").as_bytes());
    }
    let mut s: u64 = 0x5eed;
    for _ in 0..4096 {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        out.extend_from_slice(WORDS[((s >> 33) % 8) as usize]);
        out.push(SEPARATORS[((s >> 40) & 3) as usize]);
    }
    for i in 0..32u8 {
        let run = (i as usize * 7) % 61 + 3;
        out.extend(std::iter::repeat_n(i, run));
    }
    out
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Compressed-output fingerprints for the corpus, baseline vs. this runtime.
#[derive(Debug, Clone)]
pub struct CompatibilityWindow {
    baseline: HashMap<DeflateParameters, String>,
}

impl Default for CompatibilityWindow {
    fn default() -> Self {
        Self::with_baseline(Self::default_baseline())
    }
}

impl CompatibilityWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// A window checked against custom fingerprints.
    pub fn with_baseline(baseline: HashMap<DeflateParameters, String>) -> Self {
        Self { baseline }
    }

    /// The built-in known-good fingerprints.
    pub fn default_baseline() -> HashMap<DeflateParameters, String> {
        BASELINE
            .iter()
            .filter_map(|&((level, strategy, nowrap), digest)| {
                DeflateParameters::of(level, strategy, nowrap)
                    .ok()
                    .map(|p| (p, digest.to_string()))
            })
            .collect()
    }

    pub fn baseline_values(&self) -> &HashMap<DeflateParameters, String> {
        &self.baseline
    }

    /// Fingerprints produced by this runtime's deflate.
    pub fn system_values() -> Result<HashMap<DeflateParameters, String>, DeflateError> {
        let corpus = corpus();
        let mut values = HashMap::with_capacity(38);
        let mut compressed = Vec::with_capacity(corpus.len());
        for params in DeflateParameters::observable() {
            compressed.clear();
            Deflater::new(params)?.compress_slice(&corpus, &mut compressed)?;
            values.insert(params, hex(&Sha256::digest(&compressed)));
        }
        Ok(values)
    }

    /// Settings whose runtime fingerprint differs from the baseline, mapped to
    /// the runtime fingerprint. Baseline settings the runtime cannot produce
    /// map to an empty string.
    pub fn incompatible_values(
        &self,
    ) -> Result<HashMap<DeflateParameters, String>, DeflateError> {
        let system = Self::system_values()?;
        let mut incompatible = HashMap::new();
        for (params, expected) in &self.baseline {
            let actual = system.get(params).cloned().unwrap_or_default();
            if &actual != expected {
                incompatible.insert(*params, actual);
            }
        }
        Ok(incompatible)
    }

    /// True when every baseline fingerprint is reproduced.
    pub fn is_compatible(&self) -> Result<bool, DeflateError> {
        let incompatible = self.incompatible_values()?;
        for (params, actual) in &incompatible {
            log::warn!("deflate runtime mismatch for {params}: got {actual}");
        }
        Ok(incompatible.is_empty())
    }
}
