#![deny(missing_docs)]
#![deny(unsafe_code)]

/*! # Veriscript

A consensus-faithful Bitcoin script execution and signature verification
library. Given a transaction, an input index, and the set of outputs being
spent, it decides whether that input's unlock proof is valid — across
legacy scripts, P2SH, segwit v0 (P2WPKH/P2WSH), and taproot key-path and
script-path spends.

## Usage

```
use veriscript::script::{NO_FLAGS, Script, Verifier};
use veriscript::transaction::{Tx, TxIn, TxOut};

let prevouts = vec![TxOut {
    satoshis: 1000,
    lock_script: Script(vec![0x51]), // OP_1, anyone can spend
}];
let tx = Tx {
    version: 2,
    inputs: vec![TxIn::default()],
    outputs: vec![],
    lock_time: 0,
};
let verifier = Verifier::new();
assert!(verifier.verify_input(&tx, 0, &prevouts, NO_FLAGS).is_ok());
```

Verification behavior is controlled per call through the `VERIFY_*` flag
constants in [`script`]; consensus rules that activated as soft forks
(P2SH, DER signatures, CHECKLOCKTIMEVERIFY, witness, taproot, ...) are
all opt-in bits so that historical chain data can be validated under the
rules of its era.

## Concurrency

[`script::Verifier`] holds only an immutable secp256k1 verification
context. `verify_input` is a pure function of its arguments, so one
verifier can serve any number of threads with no locking.
*/

pub mod script;
pub mod transaction;
pub mod util;
