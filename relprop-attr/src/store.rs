use relprop_core::{DeviceSlots, RelpropError, StorageDevice, Tensor};

/// Relevance recorded for one side of a layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Relevance {
    /// The layer had a single input.
    Single(Tensor),
    /// One tensor per relevance-input hook, in hook registration order.
    Multi(Vec<Tensor>),
}

impl Relevance {
    pub fn as_single(&self) -> Option<&Tensor> {
        match self {
            Relevance::Single(tensor) => Some(tensor),
            Relevance::Multi(_) => None,
        }
    }

    pub fn tensors(&self) -> Vec<Tensor> {
        match self {
            Relevance::Single(tensor) => vec![tensor.clone()],
            Relevance::Multi(tensors) => tensors.clone(),
        }
    }

    /// Sum over every element of every tensor.
    pub fn total(&self) -> Result<f32, RelpropError> {
        let mut total = 0.0;
        for tensor in self.tensors() {
            total += tensor.get_f32_data()?.iter().sum::<f32>();
        }
        Ok(total)
    }
}

#[derive(Debug)]
enum InputSlot {
    Single(Option<Tensor>),
    // Indexed by hook registration position.
    Multi(Vec<Option<Tensor>>),
}

#[derive(Debug)]
struct DeviceRelevance {
    input: InputSlot,
    output: Option<Tensor>,
}

impl DeviceRelevance {
    fn empty(single_input: bool, hooked_inputs: usize) -> Self {
        DeviceRelevance {
            input: if single_input {
                InputSlot::Single(None)
            } else {
                InputSlot::Multi(vec![None; hooked_inputs])
            },
            output: None,
        }
    }
}

/// Input and output relevance of one rule, per device.
///
/// Written from gradient hooks during backward, read once the pass is over.
/// Every relevance forward pass starts with [`RelevanceStore::begin_pass`],
/// so values are overwritten by each attribution, never accumulated.
#[derive(Debug, Default)]
pub struct RelevanceStore {
    slots: DeviceSlots<DeviceRelevance>,
}

impl RelevanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets the entry of `device` and fixes how input relevance is stored.
    ///
    /// A multi-input layer gets one slot per relevance-input hook it
    /// registers, `hooked_inputs` in total.
    pub fn begin_pass(&self, device: StorageDevice, single_input: bool, hooked_inputs: usize) {
        self.slots.set(device, DeviceRelevance::empty(single_input, hooked_inputs));
    }

    pub fn record_output_relevance(&self, device: StorageDevice, relevance: Tensor) {
        self.slots.with_mut(device, |slot| {
            slot.get_or_insert_with(|| DeviceRelevance::empty(true, 0)).output = Some(relevance);
        });
    }

    /// Overwrites the input relevance of a single-input layer (`position` is
    /// `None`), or fills slot `position` of a multi-input one.
    ///
    /// Hooks fire in backward order, which need not match the order they were
    /// registered in; writing by position keeps the list in registration order.
    pub fn record_input_relevance(&self, device: StorageDevice, relevance: Tensor, position: Option<usize>) {
        self.slots.with_mut(device, |slot| {
            let entry = slot.get_or_insert_with(|| DeviceRelevance::empty(position.is_none(), 0));
            match (&mut entry.input, position) {
                (input, None) => *input = InputSlot::Single(Some(relevance)),
                (InputSlot::Multi(list), Some(index)) => {
                    if index >= list.len() {
                        log::warn!(
                            "Relevance slot {} recorded on {:?} beyond the {} slots of this pass",
                            index,
                            device,
                            list.len()
                        );
                        list.resize(index + 1, None);
                    }
                    list[index] = Some(relevance);
                }
                (input, Some(index)) => {
                    log::warn!("Multi-input relevance recorded on {:?} without begin_pass", device);
                    let mut list = vec![None; index + 1];
                    list[index] = Some(relevance);
                    *input = InputSlot::Multi(list);
                }
            }
        });
    }

    pub fn relevance_input(&self, device: StorageDevice) -> Result<Relevance, RelpropError> {
        self.slots
            .with_mut(device, |slot| match slot.as_ref().map(|entry| &entry.input) {
                Some(InputSlot::Single(Some(tensor))) => Some(Relevance::Single(tensor.clone())),
                Some(InputSlot::Multi(list)) => {
                    let recorded: Vec<Tensor> = list.iter().flatten().cloned().collect();
                    (!recorded.is_empty()).then_some(Relevance::Multi(recorded))
                }
                _ => None,
            })
            .ok_or(RelpropError::RelevanceNotComputed { device })
    }

    pub fn relevance_output(&self, device: StorageDevice) -> Result<Tensor, RelpropError> {
        self.slots
            .with_mut(device, |slot| slot.as_ref().and_then(|entry| entry.output.clone()))
            .ok_or(RelpropError::RelevanceNotComputed { device })
    }

    /// Whether the last pass on `device` saw a single-input layer.
    pub fn has_single_input(&self, device: StorageDevice) -> Option<bool> {
        self.slots.with_mut(device, |slot| {
            slot.as_ref()
                .map(|entry| matches!(entry.input, InputSlot::Single(_)))
        })
    }

    /// Devices with an entry, populated or not.
    pub fn devices(&self) -> Vec<StorageDevice> {
        self.slots.devices()
    }

    pub fn clear_device(&self, device: StorageDevice) {
        self.slots.take(device);
    }

    pub fn clear(&self) {
        self.slots.clear();
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
