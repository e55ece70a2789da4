//! Register-access values exchanged between the application and the codec.

/// Register table a unit addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "with_serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RegisterType {
    #[default]
    Invalid,
    Coils,
    DiscreteInputs,
    HoldingRegisters,
    InputRegisters,
}

/// A block of register values plus its addressing.
///
/// `start_address` is -1 while unset (decoded responses do not always carry
/// one). For coil and discrete-input units every element holds 0 or 1
/// despite being logically one bit. `value_count` can exceed `values.len()`
/// for echo-only write confirmations, which carry a count but no data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "with_serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegisterUnit {
    register_type: RegisterType,
    start_address: i32,
    value_count: usize,
    values: Vec<u16>,
}

impl Default for RegisterUnit {
    fn default() -> Self {
        Self::invalid()
    }
}

impl RegisterUnit {
    pub fn new(register_type: RegisterType, start_address: i32, values: Vec<u16>) -> Self {
        Self {
            register_type,
            start_address,
            value_count: values.len(),
            values,
        }
    }

    /// Unit with a count but no values yet: read requests and write echoes.
    pub fn with_count(register_type: RegisterType, start_address: i32, value_count: usize) -> Self {
        Self {
            register_type,
            start_address,
            value_count,
            values: Vec::new(),
        }
    }

    /// The not-a-result placeholder (`Invalid` type, unset address).
    pub fn invalid() -> Self {
        Self {
            register_type: RegisterType::Invalid,
            start_address: -1,
            value_count: 0,
            values: Vec::new(),
        }
    }

    pub fn register_type(&self) -> RegisterType {
        self.register_type
    }

    pub fn set_register_type(&mut self, register_type: RegisterType) {
        self.register_type = register_type;
    }

    pub fn start_address(&self) -> i32 {
        self.start_address
    }

    pub fn set_start_address(&mut self, start_address: i32) {
        self.start_address = start_address;
    }

    pub fn value_count(&self) -> usize {
        self.value_count
    }

    /// Overrides the count reported alongside the values; used where the
    /// protocol-visible count differs from the stored sequence length.
    pub fn set_value_count(&mut self, value_count: usize) {
        self.value_count = value_count;
    }

    pub fn values(&self) -> &[u16] {
        &self.values
    }

    pub fn set_values(&mut self, values: Vec<u16>) {
        self.value_count = values.len();
        self.values = values;
    }

    pub fn value(&self, index: usize) -> Option<u16> {
        self.values.get(index).copied()
    }

    pub fn is_valid(&self) -> bool {
        self.register_type != RegisterType::Invalid
    }
}
