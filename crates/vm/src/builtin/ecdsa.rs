//! The ECDSA signature builtin: verifies a signature against a public key and message cell
//! as they are written. Grounded on the validation-rule shape of `cairo-rs`'s
//! `SignatureBuiltinRunner` (signatures are registered out of band — normally by a hint calling
//! `add_signature` — and checked lazily when the message cell is asserted).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use starknet_crypto::verify;
use starknet_types_core::felt::Felt;

use crate::error::MemoryError;
use crate::memory::Memory;
use crate::relocatable::Relocatable;

#[derive(Debug, Clone)]
pub struct EcdsaBuiltinRunner {
    pub base: Relocatable,
    pub ratio: Option<u32>,
    pub(super) stop_ptr: Option<usize>,
    signatures: Rc<RefCell<HashMap<Relocatable, (Felt, Felt)>>>,
}

impl EcdsaBuiltinRunner {
    pub fn new(base: Relocatable, ratio: Option<u32>) -> Self {
        Self {
            base,
            ratio,
            stop_ptr: None,
            signatures: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    pub const fn cells_per_instance(&self) -> usize {
        2
    }

    pub const fn n_input_cells(&self) -> usize {
        2
    }

    /// Registers a signature for the public key cell at `pubkey_addr`. Mirrors the reference
    /// compiler's `add_signature` hint.
    pub fn add_signature(&self, pubkey_addr: Relocatable, r: Felt, s: Felt) {
        self.signatures.borrow_mut().insert(pubkey_addr, (r, s));
    }

    pub fn add_validation_rule(&self, memory: &mut Memory) {
        let segment_index = self.base.segment_index as usize;
        let signatures = Rc::clone(&self.signatures);
        let rule: crate::memory::ValidationRule = Rc::new(move |memory, address| {
            // Only the message cell (the odd offset of each two-cell instance) triggers
            // verification; the public-key cell alone has nothing to check yet.
            if address.offset % 2 != 1 {
                return Ok(vec![*address]);
            }
            let pubkey_addr = address.sub_uint(1).expect("odd offset implies offset >= 1");
            let pubkey = memory
                .get_felt(&pubkey_addr)
                .map_err(|_| MemoryError::PubKeyNonInt)?;
            let message = memory.get_felt(address).map_err(|_| MemoryError::MsgNonInt)?;

            let (r, s) = signatures
                .borrow()
                .get(&pubkey_addr)
                .copied()
                .ok_or(MemoryError::SignatureNotFound(pubkey_addr))?;

            let valid =
                verify(&pubkey, &message, &r, &s).map_err(|_| MemoryError::InvalidSignature)?;
            if !valid {
                return Err(MemoryError::InvalidSignature);
            }
            Ok(vec![pubkey_addr, *address])
        });
        memory.add_validation_rule(segment_index, rule);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::MaybeRelocatable;
    use starknet_crypto::{get_public_key, sign};

    #[test]
    fn verifies_a_valid_signature_on_write() {
        let private_key = Felt::from(12345u32);
        let public_key = get_public_key(&private_key);
        let message = Felt::from(67890u32);
        let k = Felt::from(1u32);
        let signature = sign(&private_key, &message, &k).unwrap();

        let mut memory = Memory::new();
        let runner = EcdsaBuiltinRunner::new(Relocatable::new(7, 0), Some(512));
        runner.add_validation_rule(&mut memory);
        runner.add_signature(Relocatable::new(7, 0), signature.r, signature.s);

        memory
            .set(Relocatable::new(7, 0), MaybeRelocatable::from_felt(public_key))
            .unwrap();
        assert!(memory
            .set(Relocatable::new(7, 1), MaybeRelocatable::from_felt(message))
            .is_ok());
    }

    #[test]
    fn rejects_a_message_with_no_registered_signature() {
        let mut memory = Memory::new();
        let runner = EcdsaBuiltinRunner::new(Relocatable::new(7, 0), Some(512));
        runner.add_validation_rule(&mut memory);
        memory
            .set(Relocatable::new(7, 0), MaybeRelocatable::from_felt(Felt::from(1u8)))
            .unwrap();
        assert_eq!(
            memory.set(Relocatable::new(7, 1), MaybeRelocatable::from_felt(Felt::from(2u8))),
            Err(MemoryError::SignatureNotFound(Relocatable::new(7, 0)))
        );
    }
}
