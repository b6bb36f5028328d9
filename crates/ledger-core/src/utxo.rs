//! Spendable-output discovery by a single backward pass over the chain.

use crate::chain::{Chain, ChainStore};
use crate::error::{LedgerError, LedgerResult};
use crate::tx::{OutPoint, Transaction, TxInput, TxOutput};
use crate::Hash;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// Outputs picked to fund a payment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpendableOutputs {
    pub accumulated: u64,
    /// Output indices per transaction id, ordered by id then index.
    pub selection: BTreeMap<Hash, Vec<u32>>,
}

impl SpendableOutputs {
    pub fn outpoints(&self) -> impl Iterator<Item = OutPoint> + '_ {
        self.selection.iter().flat_map(|(txid, indices)| {
            indices.iter().map(move |index| OutPoint {
                txid: *txid,
                index: *index,
            })
        })
    }
}

/// A transaction holding at least one unspent output for the scanned address.
struct Unspent {
    tx: Transaction,
    indices: Vec<u32>,
}

impl<S: ChainStore> Chain<S> {
    /// Tip-to-genesis scan. Spends always sit in later blocks than the outputs
    /// they consume, so each input is recorded before its output is visited.
    fn scan_unspent(&self, address: &str) -> LedgerResult<Vec<Unspent>> {
        let mut spent: HashMap<Hash, BTreeSet<u32>> = HashMap::new();
        let mut unspent = Vec::new();

        for block in self.iter() {
            for tx in block?.transactions {
                let consumed = spent.get(&tx.id);
                let indices: Vec<u32> = tx
                    .indexed_outputs()
                    .filter(|(index, _)| !consumed.is_some_and(|set| set.contains(index)))
                    .filter(|(_, output)| output.is_locked_to(address))
                    .map(|(index, _)| index)
                    .collect();

                if !tx.is_coinbase() {
                    for input in tx.inputs.iter().filter(|i| i.can_unlock(address)) {
                        if let Some(op) = input.outpoint() {
                            spent.entry(op.txid).or_default().insert(op.index);
                        }
                    }
                }

                if !indices.is_empty() {
                    unspent.push(Unspent { tx, indices });
                }
            }
        }
        Ok(unspent)
    }

    /// Transactions with at least one output `address` can still spend,
    /// newest first. Each transaction appears once.
    pub fn find_unspent_transactions(&self, address: &str) -> LedgerResult<Vec<Transaction>> {
        Ok(self
            .scan_unspent(address)?
            .into_iter()
            .map(|u| u.tx)
            .collect())
    }

    pub fn collect_unspent_outputs(&self, address: &str) -> LedgerResult<Vec<TxOutput>> {
        let mut outputs = Vec::new();
        for Unspent { tx, indices } in self.scan_unspent(address)? {
            outputs.extend(indices.iter().map(|i| tx.outputs[*i as usize].clone()));
        }
        Ok(outputs)
    }

    /// Greedy first-found selection over unspent outputs ordered by transaction
    /// id, then output index. Stops once `amount` is covered.
    pub fn select_spendable_outputs(
        &self,
        address: &str,
        amount: u64,
    ) -> LedgerResult<SpendableOutputs> {
        let mut candidates: Vec<(OutPoint, u64)> = Vec::new();
        for Unspent { tx, indices } in self.scan_unspent(address)? {
            for index in indices {
                let value = tx.outputs[index as usize].value;
                candidates.push((OutPoint { txid: tx.id, index }, value));
            }
        }
        candidates.sort_unstable_by_key(|(op, _)| *op);

        let mut picked = SpendableOutputs::default();
        for (op, value) in candidates {
            if picked.accumulated >= amount {
                break;
            }
            picked.accumulated = picked.accumulated.saturating_add(value);
            picked.selection.entry(op.txid).or_default().push(op.index);
        }
        debug!(
            address,
            amount,
            accumulated = picked.accumulated,
            outputs = picked.outpoints().count(),
            "selected spendable outputs"
        );
        Ok(picked)
    }

    pub fn balance(&self, address: &str) -> LedgerResult<u64> {
        Ok(self
            .collect_unspent_outputs(address)?
            .iter()
            .fold(0u64, |acc, out| acc.saturating_add(out.value)))
    }

    /// Pays `amount` from `from` to `to`, returning change to `from` when the
    /// selected outputs overshoot.
    pub fn build_transaction(&self, from: &str, to: &str, amount: u64) -> LedgerResult<Transaction> {
        if amount == 0 {
            return Err(LedgerError::InvalidAmount);
        }
        let picked = self.select_spendable_outputs(from, amount)?;
        if picked.accumulated < amount {
            return Err(LedgerError::InsufficientFunds {
                required: amount,
                available: picked.accumulated,
            });
        }

        let inputs = picked
            .outpoints()
            .map(|op| TxInput::spending(op, from))
            .collect();
        let mut outputs = vec![TxOutput::new(amount, to)];
        if picked.accumulated > amount {
            outputs.push(TxOutput::new(picked.accumulated - amount, from));
        }
        Ok(Transaction::new(inputs, outputs)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COINBASE_REWARD;
    use crate::mem_store::MemStore;
    use std::sync::Arc;

    fn new_chain(address: &str) -> Chain<MemStore> {
        Chain::initialize(Arc::new(MemStore::default()), address).unwrap()
    }

    fn send(chain: &mut Chain<MemStore>, from: &str, to: &str, amount: u64) -> Transaction {
        let tx = chain.build_transaction(from, to, amount).unwrap();
        chain.append(vec![tx.clone()]).unwrap();
        tx
    }

    #[test]
    fn genesis_owner_holds_reward() {
        let chain = new_chain("Alice");
        assert_eq!(chain.balance("Alice").unwrap(), COINBASE_REWARD);
        assert_eq!(chain.balance("Bob").unwrap(), 0);
        assert_eq!(chain.find_unspent_transactions("Alice").unwrap().len(), 1);
    }

    #[test]
    fn transfer_with_change() {
        let mut chain = new_chain("Alice");
        let tx = send(&mut chain, "Alice", "Bob", 40);
        assert_eq!(tx.outputs, vec![TxOutput::new(40, "Bob"), TxOutput::new(60, "Alice")]);
        assert!(tx.inputs.iter().all(|i| i.can_unlock("Alice")));
        assert_eq!(chain.balance("Alice").unwrap(), 60);
        assert_eq!(chain.balance("Bob").unwrap(), 40);
    }

    #[test]
    fn exact_amount_has_no_change_output() {
        let mut chain = new_chain("Alice");
        let tx = send(&mut chain, "Alice", "Bob", COINBASE_REWARD);
        assert_eq!(tx.outputs.len(), 1);
        assert_eq!(chain.balance("Alice").unwrap(), 0);
        assert!(chain.find_unspent_transactions("Alice").unwrap().is_empty());
    }

    #[test]
    fn insufficient_funds_reports_available() {
        let chain = new_chain("Alice");
        let err = chain.build_transaction("Alice", "Bob", 1000).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds {
                required: 1000,
                available: COINBASE_REWARD
            }
        ));
    }

    #[test]
    fn zero_amount_is_rejected() {
        let chain = new_chain("Alice");
        assert!(matches!(
            chain.build_transaction("Alice", "Bob", 0),
            Err(LedgerError::InvalidAmount)
        ));
    }

    #[test]
    fn unknown_sender_has_nothing() {
        let chain = new_chain("Alice");
        let err = chain.build_transaction("Mallory", "Bob", 1).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds { available: 0, .. }
        ));
    }

    #[test]
    fn spent_outputs_are_not_offered_again() {
        let mut chain = new_chain("Alice");
        let first = send(&mut chain, "Alice", "Bob", 30);
        let picked = chain.select_spendable_outputs("Alice", 70).unwrap();
        assert_eq!(picked.accumulated, 70);
        let ops: Vec<OutPoint> = picked.outpoints().collect();
        assert_eq!(ops, vec![OutPoint { txid: first.id, index: 1 }]);
    }

    #[test]
    fn selection_collects_several_outputs_in_id_order() {
        let mut chain = new_chain("Alice");
        let a = send(&mut chain, "Alice", "Bob", 10);
        let b = send(&mut chain, "Alice", "Bob", 20);
        assert_eq!(chain.balance("Bob").unwrap(), 30);

        let picked = chain.select_spendable_outputs("Bob", 25).unwrap();
        assert_eq!(picked.accumulated, 30);
        let mut expected = vec![(a.id, vec![0u32]), (b.id, vec![0u32])];
        expected.sort();
        assert_eq!(picked.selection.into_iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn selection_stops_once_covered() {
        let mut chain = new_chain("Alice");
        send(&mut chain, "Alice", "Bob", 10);
        send(&mut chain, "Alice", "Bob", 20);
        let picked = chain.select_spendable_outputs("Bob", 5).unwrap();
        assert_eq!(picked.outpoints().count(), 1);
        assert!(picked.accumulated >= 5);
    }

    #[test]
    fn chained_spends_keep_totals() {
        let mut chain = new_chain("Alice");
        send(&mut chain, "Alice", "Bob", 40);
        send(&mut chain, "Bob", "Carol", 15);
        send(&mut chain, "Alice", "Carol", 60);
        assert_eq!(chain.balance("Alice").unwrap(), 0);
        assert_eq!(chain.balance("Bob").unwrap(), 25);
        assert_eq!(chain.balance("Carol").unwrap(), 75);
        assert_eq!(chain.verify().unwrap(), 4);
    }

    #[test]
    fn collected_outputs_only_belong_to_address() {
        let mut chain = new_chain("Alice");
        send(&mut chain, "Alice", "Bob", 40);
        let outs = chain.collect_unspent_outputs("Alice").unwrap();
        assert_eq!(outs, vec![TxOutput::new(60, "Alice")]);
    }

    #[test]
    fn balance_is_idempotent() {
        let mut chain = new_chain("Alice");
        send(&mut chain, "Alice", "Bob", 1);
        assert_eq!(chain.balance("Bob").unwrap(), chain.balance("Bob").unwrap());
        assert_eq!(
            chain.select_spendable_outputs("Alice", 50).unwrap(),
            chain.select_spendable_outputs("Alice", 50).unwrap()
        );
    }
}
