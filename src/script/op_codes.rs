//! Script opcodes for Bitcoin consensus execution.
//!
//! Constants grouped by category, matching the fixed consensus table
//! (BIP-16/65/66/112/141/143/341/342). The byte values never change;
//! upgrades happen only through the NOP and OP_SUCCESS ranges.
//!
//! Use in the interpreter: `match op { OP_IF => ..., _ => err }`.
//!
//! # Examples
//! ```
//! use veriscript::script::op_codes::*;
//! assert_eq!(OP_IF, 99);
//! ```

// Pushdata and Constants
/// Pushes empty array (0/false) onto the stack.
pub const OP_0: u8 = 0;
/// Alias for OP_0.
pub const OP_FALSE: u8 = 0;
/// Offset for direct pushes: opcodes 1-75 push that many following bytes.
pub const OP_PUSH: u8 = 0;

/// Next byte is push length (up to 255 bytes).
pub const OP_PUSHDATA1: u8 = 76;
/// Next two bytes are push length (up to 65535 bytes).
pub const OP_PUSHDATA2: u8 = 77;
/// Next four bytes are push length (up to 4GB).
pub const OP_PUSHDATA4: u8 = 78;

/// Pushes -1 onto the stack.
pub const OP_1NEGATE: u8 = 79;

/// Pushes 1 (true) onto the stack.
pub const OP_1: u8 = 81;
/// Alias for OP_1.
pub const OP_TRUE: u8 = 81;

// Numeric constants (2-16)
/// Pushes 2.
pub const OP_2: u8 = 82;
/// Pushes 3.
pub const OP_3: u8 = 83;
/// Pushes 4.
pub const OP_4: u8 = 84;
/// Pushes 5.
pub const OP_5: u8 = 85;
/// Pushes 6.
pub const OP_6: u8 = 86;
/// Pushes 7.
pub const OP_7: u8 = 87;
/// Pushes 8.
pub const OP_8: u8 = 88;
/// Pushes 9.
pub const OP_9: u8 = 89;
/// Pushes 10.
pub const OP_10: u8 = 90;
/// Pushes 11.
pub const OP_11: u8 = 91;
/// Pushes 12.
pub const OP_12: u8 = 92;
/// Pushes 13.
pub const OP_13: u8 = 93;
/// Pushes 14.
pub const OP_14: u8 = 94;
/// Pushes 15.
pub const OP_15: u8 = 95;
/// Pushes 16.
pub const OP_16: u8 = 96;

// Flow Control
/// Does nothing.
pub const OP_NOP: u8 = 97;

/// If top stack is true, execute block (pops bool).
pub const OP_IF: u8 = 99;
/// If top stack is false, execute block (pops bool).
pub const OP_NOTIF: u8 = 100;
/// Inverts preceding IF/NOTIF execution.
pub const OP_ELSE: u8 = 103;
/// Ends IF/ELSE block.
pub const OP_ENDIF: u8 = 104;
/// Fails if top stack false (pops bool).
pub const OP_VERIFY: u8 = 105;
/// Ends execution as invalid.
pub const OP_RETURN: u8 = 106;

// Stack Operations
/// Moves top item to alt stack.
pub const OP_TOALTSTACK: u8 = 107;
/// Moves top alt stack item to main stack.
pub const OP_FROMALTSTACK: u8 = 108;

/// Duplicates top if non-zero.
pub const OP_IFDUP: u8 = 115;
/// Pushes stack depth.
pub const OP_DEPTH: u8 = 116;
/// Drops top item.
pub const OP_DROP: u8 = 117;
/// Duplicates top.
pub const OP_DUP: u8 = 118;
/// Removes second-top.
pub const OP_NIP: u8 = 119;
/// Copies second-top to top.
pub const OP_OVER: u8 = 120;
/// Copies nth item to top.
pub const OP_PICK: u8 = 121;
/// Moves nth item to top.
pub const OP_ROLL: u8 = 122;
/// Rotates top three left.
pub const OP_ROT: u8 = 123;
/// Swaps top two.
pub const OP_SWAP: u8 = 124;
/// Copies top under second-top.
pub const OP_TUCK: u8 = 125;

/// Drops top two.
pub const OP_2DROP: u8 = 109;
/// Duplicates top two.
pub const OP_2DUP: u8 = 110;
/// Duplicates top three.
pub const OP_3DUP: u8 = 111;
/// Copies third/fourth to top.
pub const OP_2OVER: u8 = 112;
/// Moves fifth/sixth to top.
pub const OP_2ROT: u8 = 113;
/// Swaps top two pairs.
pub const OP_2SWAP: u8 = 114;

/// Pushes length of top (no pop).
pub const OP_SIZE: u8 = 130;

// Bitwise Logic
/// Equals top two (bytes).
pub const OP_EQUAL: u8 = 135;
/// Equals + VERIFY.
pub const OP_EQUALVERIFY: u8 = 136;

// Arithmetic
/// Adds 1 to top.
pub const OP_1ADD: u8 = 139;
/// Subtracts 1 from top.
pub const OP_1SUB: u8 = 140;
/// Negates top.
pub const OP_NEGATE: u8 = 143;
/// Absolute value of top.
pub const OP_ABS: u8 = 144;
/// Logical NOT top (0/1 -> 1/0).
pub const OP_NOT: u8 = 145;
/// 0 != top (1 if non-zero).
pub const OP_0NOTEQUAL: u8 = 146;
/// Adds top two.
pub const OP_ADD: u8 = 147;
/// Subtracts top from second.
pub const OP_SUB: u8 = 148;
/// Boolean AND nums.
pub const OP_BOOLAND: u8 = 154;
/// Boolean OR nums.
pub const OP_BOOLOR: u8 = 155;
/// Numeric equal.
pub const OP_NUMEQUAL: u8 = 156;
/// Numeric equal + VERIFY.
pub const OP_NUMEQUALVERIFY: u8 = 157;
/// Numeric not equal.
pub const OP_NUMNOTEQUAL: u8 = 158;
/// a < b (nums).
pub const OP_LESSTHAN: u8 = 159;
/// a > b (nums).
pub const OP_GREATERTHAN: u8 = 160;
/// a <= b (nums).
pub const OP_LESSTHANOREQUAL: u8 = 161;
/// a >= b (nums).
pub const OP_GREATERTHANOREQUAL: u8 = 162;
/// Min(a, b) nums.
pub const OP_MIN: u8 = 163;
/// Max(a, b) nums.
pub const OP_MAX: u8 = 164;
/// min <= x < max (nums).
pub const OP_WITHIN: u8 = 165;

// Cryptography
/// RIPEMD160(top).
pub const OP_RIPEMD160: u8 = 166;
/// SHA1(top) (legacy).
pub const OP_SHA1: u8 = 167;
/// SHA256(top).
pub const OP_SHA256: u8 = 168;
/// RIPEMD160(SHA256(top)).
pub const OP_HASH160: u8 = 169;
/// SHA256(SHA256(top)).
pub const OP_HASH256: u8 = 170;
/// Starts sig matching from here.
pub const OP_CODESEPARATOR: u8 = 171;
/// Verifies sig for pubkey/tx (1/0).
pub const OP_CHECKSIG: u8 = 172;
/// CHECKSIG + VERIFY.
pub const OP_CHECKSIGVERIFY: u8 = 173;
/// m-of-n multisig verify (1/0); invalid in tapscript.
pub const OP_CHECKMULTISIG: u8 = 174;
/// CHECKMULTISIG + VERIFY.
pub const OP_CHECKMULTISIGVERIFY: u8 = 175;
/// Adds a Schnorr signature check result to an accumulator (BIP-342, tapscript only).
pub const OP_CHECKSIGADD: u8 = 186;

// Locktime
/// Fails if locktime > tx.lock_time (BIP-65); NOP2 before activation.
pub const OP_CHECKLOCKTIMEVERIFY: u8 = 177;
/// Fails if sequence < tx input sequence (BIP-112, relative); NOP3 before activation.
pub const OP_CHECKSEQUENCEVERIFY: u8 = 178;

// Reserved (invalid when executed)
pub(crate) const OP_RESERVED: u8 = 80;
pub(crate) const OP_VER: u8 = 98;
pub(crate) const OP_VERIF: u8 = 101;
pub(crate) const OP_VERNOTIF: u8 = 102;
pub(crate) const OP_RESERVED1: u8 = 137;
pub(crate) const OP_RESERVED2: u8 = 138;

// Upgradable NOPs (ignored unless discouraged by policy)
pub(crate) const OP_NOP1: u8 = 176;
pub(crate) const OP_NOP4: u8 = 179;
pub(crate) const OP_NOP5: u8 = 180;
pub(crate) const OP_NOP6: u8 = 181;
pub(crate) const OP_NOP7: u8 = 182;
pub(crate) const OP_NOP8: u8 = 183;
pub(crate) const OP_NOP9: u8 = 184;
pub(crate) const OP_NOP10: u8 = 185;

// Disabled (CVE-2010-5137 family; presence fails legacy/segwit-v0 scripts)
pub(crate) const OP_CAT: u8 = 126;
pub(crate) const OP_SUBSTR: u8 = 127;
pub(crate) const OP_LEFT: u8 = 128;
pub(crate) const OP_RIGHT: u8 = 129;
pub(crate) const OP_INVERT: u8 = 131;
pub(crate) const OP_AND: u8 = 132;
pub(crate) const OP_OR: u8 = 133;
pub(crate) const OP_XOR: u8 = 134;
pub(crate) const OP_2MUL: u8 = 141;
pub(crate) const OP_2DIV: u8 = 142;
pub(crate) const OP_MUL: u8 = 149;
pub(crate) const OP_DIV: u8 = 150;
pub(crate) const OP_MOD: u8 = 151;
pub(crate) const OP_LSHIFT: u8 = 152;
pub(crate) const OP_RSHIFT: u8 = 153;

/// True for the opcodes hard-disabled in legacy and segwit-v0 scripts.
#[must_use]
#[inline]
pub(crate) fn is_disabled(op: u8) -> bool {
    matches!(
        op,
        OP_CAT
            | OP_SUBSTR
            | OP_LEFT
            | OP_RIGHT
            | OP_INVERT
            | OP_AND
            | OP_OR
            | OP_XOR
            | OP_2MUL
            | OP_2DIV
            | OP_MUL
            | OP_DIV
            | OP_MOD
            | OP_LSHIFT
            | OP_RSHIFT
    )
}

/// True for opcode bytes that terminate tapscript execution as an
/// unconditional success (BIP-342 upgrade mechanism).
#[must_use]
#[inline]
pub fn is_op_success(op: u8) -> bool {
    matches!(
        op,
        80 | 98 | 126..=129 | 131..=134 | 137..=138 | 141..=142 | 149..=153 | 187..=254
    )
}
