//! A priced, unsigned transaction shape.
//!
//! Every builder in the engine reduces to the same problem: some inputs and
//! outputs are fixed by the request, native coins are added until the fixed
//! outputs plus the fee are paid for, and whatever is left over above dust
//! becomes a change output. [SpendPlanBuilder] solves that once.

use tracing::debug;

use super::coin_selector::select_prefix;
use super::coin_selector::SelectionPriority;
use crate::models::blockchain::fee::FeeRate;
use crate::models::blockchain::outpoint::Outpoint;
use crate::models::blockchain::script::Script;
use crate::models::blockchain::sighash::placeholder_unlocking_script;
use crate::models::blockchain::sighash::SighashType;
use crate::models::blockchain::transaction::Transaction;
use crate::models::blockchain::transaction::TxInput;
use crate::models::blockchain::transaction::TxOutput;
use crate::models::state::coin::Coin;
use crate::models::state::wallet::keys::KeyRole;
use crate::tx_initiation::error::EngineError;

/// How an input gets its unlocking script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSigner {
    /// signed by one of this wallet's keys
    Wallet {
        role: KeyRole,
        sighash_type: SighashType,

        /// pushed after `<sig> <pubkey>`, e.g. a mint reveal's payload
        extra_pushes: Vec<Vec<u8>>,
    },

    /// already signed by someone else; kept byte for byte
    Presigned(Script),
}

/// An input together with the output it spends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendInput {
    pub outpoint: Outpoint,
    pub prev_output: TxOutput,
    pub signer: InputSigner,
}

impl SpendInput {
    /// wallet coin signed over the whole transaction
    pub fn from_coin(coin: &Coin, role: KeyRole) -> Self {
        Self {
            outpoint: coin.outpoint,
            prev_output: coin.as_tx_output(),
            signer: InputSigner::Wallet {
                role,
                sighash_type: SighashType::All,
                extra_pushes: vec![],
            },
        }
    }

    pub fn with_sighash(mut self, sighash: SighashType) -> Self {
        if let InputSigner::Wallet { sighash_type, .. } = &mut self.signer {
            *sighash_type = sighash;
        }
        self
    }

    pub fn value(&self) -> u64 {
        self.prev_output.value
    }

    pub fn is_wallet_signed(&self) -> bool {
        matches!(self.signer, InputSigner::Wallet { .. })
    }

    /// The unlocking script used for sizing: worst case for inputs this wallet
    /// signs, exact for presigned ones.
    pub fn fee_basis_unlock(&self) -> Script {
        match &self.signer {
            InputSigner::Wallet { extra_pushes, .. } => {
                let extra: Vec<&[u8]> = extra_pushes.iter().map(Vec::as_slice).collect();
                placeholder_unlocking_script(&extra)
            }
            InputSigner::Presigned(script) => script.clone(),
        }
    }

    fn fee_basis_tx_input(&self) -> TxInput {
        TxInput {
            script_sig: self.fee_basis_unlock(),
            ..TxInput::spending(self.outpoint)
        }
    }
}

/// Inputs and outputs in final order, with the fee they pay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendPlan {
    pub inputs: Vec<SpendInput>,
    pub outputs: Vec<TxOutput>,

    /// index into `outputs` of the native change output
    pub change_index: Option<usize>,

    /// sum of inputs minus sum of outputs
    pub fee: u64,

    /// serialized size with every wallet-signed input at its worst case
    pub fee_basis_size: usize,
}

impl SpendPlan {
    /// The transaction with worst case unlocking scripts in place of
    /// signatures. Its serialized length is [Self::fee_basis_size].
    pub fn placeholder_transaction(&self) -> Transaction {
        Transaction {
            inputs: self.inputs.iter().map(SpendInput::fee_basis_tx_input).collect(),
            outputs: self.outputs.clone(),
            ..Default::default()
        }
    }

    /// The transaction to be signed: presigned inputs carry their scripts,
    /// wallet inputs are empty.
    pub fn unsigned_transaction(&self) -> Transaction {
        Transaction {
            inputs: self
                .inputs
                .iter()
                .map(|i| match &i.signer {
                    InputSigner::Presigned(script) => TxInput {
                        script_sig: script.clone(),
                        ..TxInput::spending(i.outpoint)
                    },
                    InputSigner::Wallet { .. } => TxInput::spending(i.outpoint),
                })
                .collect(),
            outputs: self.outputs.clone(),
            ..Default::default()
        }
    }

    pub fn total_in(&self) -> u64 {
        self.inputs.iter().map(SpendInput::value).sum()
    }

    pub fn total_out(&self) -> u64 {
        self.outputs.iter().map(|o| o.value).sum()
    }

    /// outpoints of inputs this wallet signs
    pub fn wallet_outpoints(&self) -> Vec<Outpoint> {
        self.inputs
            .iter()
            .filter(|i| i.is_wallet_signed())
            .map(|i| i.outpoint)
            .collect()
    }
}

/// Assembles a [SpendPlan].
///
/// ```text
/// SpendPlanBuilder::new()
///     .fixed_inputs(token_inputs)
///     .fixed_outputs([recipient, token_change])
///     .native_candidates(fee_coins)
///     .change_script(own_p2pkh)
///     .fee_rate(rate)
///     .dust_threshold(546)
///     .build()?
/// ```
#[derive(Debug, Default)]
pub struct SpendPlanBuilder {
    fixed_inputs: Vec<SpendInput>,
    fixed_outputs: Vec<TxOutput>,
    native_candidates: Vec<SpendInput>,
    change_script: Option<Script>,
    fee_rate: Option<FeeRate>,
    dust_threshold: u64,
    priority: SelectionPriority,
}

impl SpendPlanBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fixed_input(mut self, input: SpendInput) -> Self {
        self.fixed_inputs.push(input);
        self
    }

    pub fn fixed_inputs(mut self, inputs: impl IntoIterator<Item = SpendInput>) -> Self {
        self.fixed_inputs.extend(inputs);
        self
    }

    pub fn fixed_output(mut self, output: TxOutput) -> Self {
        self.fixed_outputs.push(output);
        self
    }

    pub fn fixed_outputs(mut self, outputs: impl IntoIterator<Item = TxOutput>) -> Self {
        self.fixed_outputs.extend(outputs);
        self
    }

    /// native coins that may be added to pay for outputs and fee
    pub fn native_candidates(mut self, candidates: impl IntoIterator<Item = SpendInput>) -> Self {
        self.native_candidates.extend(candidates);
        self
    }

    pub fn change_script(mut self, script: Script) -> Self {
        self.change_script = Some(script);
        self
    }

    pub fn fee_rate(mut self, fee_rate: FeeRate) -> Self {
        self.fee_rate = Some(fee_rate);
        self
    }

    pub fn dust_threshold(mut self, dust_threshold: u64) -> Self {
        self.dust_threshold = dust_threshold;
        self
    }

    pub fn priority(mut self, priority: SelectionPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn build(self) -> Result<SpendPlan, EngineError> {
        let Self {
            fixed_inputs,
            fixed_outputs,
            mut native_candidates,
            change_script,
            fee_rate,
            dust_threshold,
            priority,
        } = self;

        let fee_rate = fee_rate.unwrap_or_default();
        let change_script = change_script.unwrap_or_default();
        priority.sort(&mut native_candidates, |i| (i.value(), i.outpoint));

        let fixed_in: u64 = fixed_inputs.iter().map(SpendInput::value).sum();
        let fixed_out: u64 = fixed_outputs.iter().map(|o| o.value).sum();
        let values: Vec<u64> = native_candidates.iter().map(SpendInput::value).collect();

        let change_template = TxOutput::new(0, change_script.clone());
        let shape = |count: usize, with_change: bool| Transaction {
            inputs: fixed_inputs
                .iter()
                .chain(&native_candidates[..count])
                .map(SpendInput::fee_basis_tx_input)
                .collect(),
            outputs: fixed_outputs
                .iter()
                .cloned()
                .chain(with_change.then(|| change_template.clone()))
                .collect(),
            ..Default::default()
        };

        let selection = select_prefix(
            &values,
            fixed_in,
            fixed_out,
            fee_rate,
            dust_threshold,
            |count, with_change| shape(count, with_change).size(),
        )?;

        let mut inputs = fixed_inputs;
        inputs.extend(native_candidates.into_iter().take(selection.count));
        let mut outputs = fixed_outputs;
        let change_index = selection.change.map(|value| {
            outputs.push(TxOutput::new(value, change_script));
            outputs.len() - 1
        });

        let plan = SpendPlan {
            inputs,
            outputs,
            change_index,
            fee: selection.fee,
            fee_basis_size: selection.size,
        };
        debug!(
            inputs = plan.inputs.len(),
            outputs = plan.outputs.len(),
            fee = plan.fee,
            size = plan.fee_basis_size,
            %fee_rate,
            "spend plan built"
        );
        Ok(plan)
    }
}
