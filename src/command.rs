//! Command words written to `CMD`.
//!
//! Field positions come from the register map in `croc-csr`; composing a
//! command is a bit-OR of the shifted fields, each checked against its width
//! first.

use {
    crate::error::{Error, Result},
    croc_csr::{utra::ascon, Field},
};

const FIELDS: [(&str, Field); 5] = [
    ("mode", ascon::CMD_MODE),
    ("eot", ascon::CMD_EOT),
    ("eoi", ascon::CMD_EOI),
    ("type", ascon::CMD_TYPE),
    ("eoo", ascon::CMD_EOO),
];

/// Raw command fields, in register order of the encoder arguments.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    pub mode: u32,
    pub eot: u32,
    pub eoi: u32,
    pub ty: u32,
    pub eoo: u32,
}

impl Fields {
    fn values(&self) -> [u32; 5] {
        [self.mode, self.eot, self.eoi, self.ty, self.eoo]
    }

    pub fn encode(&self) -> Result<u32> {
        let mut word = 0;
        for (&(name, field), value) in FIELDS.iter().zip(self.values()) {
            if !field.fits(value) {
                return Err(Error::FieldOverflow {
                    field: name,
                    value,
                    width: field.width(),
                });
            }
            word |= field.ms(value);
        }
        Ok(word)
    }

    /// Splits a command word into its fields. Bits outside every field are
    /// ignored.
    pub fn decode(word: u32) -> Self {
        Self {
            mode: ascon::CMD_MODE.extract(word),
            eot: ascon::CMD_EOT.extract(word),
            eoi: ascon::CMD_EOI.extract(word),
            ty: ascon::CMD_TYPE.extract(word),
            eoo: ascon::CMD_EOO.extract(word),
        }
    }
}

/// Composes a command word from raw field values.
pub fn encode(mode: u32, eot: u32, eoi: u32, ty: u32, eoo: u32) -> Result<u32> {
    Fields {
        mode,
        eot,
        eoi,
        ty,
        eoo,
    }
    .encode()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Mode {
    Decrypt = 0,
    Encrypt = 1,
}

/// Data type tag of a segment.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DataType {
    Key = 0,
    Nonce = 1,
    Ad = 2,
    Msg = 3,
    Tag = 4,
}

impl TryFrom<u32> for DataType {
    type Error = Error;

    fn try_from(tag: u32) -> Result<Self> {
        match tag {
            0 => Ok(DataType::Key),
            1 => Ok(DataType::Nonce),
            2 => Ok(DataType::Ad),
            3 => Ok(DataType::Msg),
            4 => Ok(DataType::Tag),
            _ => Err(Error::UnknownDataType(tag)),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Command {
    pub mode: Mode,
    /// Last segment of this data type
    pub eot: bool,
    /// Last segment of the input
    pub eoi: bool,
    pub ty: DataType,
    /// Last segment of the output
    pub eoo: bool,
}

impl Command {
    pub fn new(mode: Mode, ty: DataType) -> Self {
        Self {
            mode,
            eot: false,
            eoi: false,
            ty,
            eoo: false,
        }
    }

    pub fn eot(self, eot: bool) -> Self {
        Self { eot, ..self }
    }

    pub fn eoi(self, eoi: bool) -> Self {
        Self { eoi, ..self }
    }

    pub fn eoo(self, eoo: bool) -> Self {
        Self { eoo, ..self }
    }

    pub fn fields(&self) -> Fields {
        Fields {
            mode: self.mode as u32,
            eot: self.eot.into(),
            eoi: self.eoi.into(),
            ty: self.ty as u32,
            eoo: self.eoo.into(),
        }
    }

    pub fn encode(&self) -> u32 {
        // Typed fields always fit.
        let f = self.fields();
        ascon::CMD_MODE.ms(f.mode)
            | ascon::CMD_EOT.ms(f.eot)
            | ascon::CMD_EOI.ms(f.eoi)
            | ascon::CMD_TYPE.ms(f.ty)
            | ascon::CMD_EOO.ms(f.eoo)
    }

    pub fn decode(word: u32) -> Result<Self> {
        let f = Fields::decode(word);
        Ok(Self {
            mode: if f.mode == 1 {
                Mode::Encrypt
            } else {
                Mode::Decrypt
            },
            eot: f.eot == 1,
            eoi: f.eoi == 1,
            ty: DataType::try_from(f.ty)?,
            eoo: f.eoo == 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_phase_command_is_pinned() {
        assert_eq!(encode(1, 1, 0, DataType::Nonce as u32, 0), Ok(0x103));
        let cmd = Command::new(Mode::Encrypt, DataType::Nonce).eot(true);
        assert_eq!(cmd.encode(), 0x103);
    }

    #[test]
    fn each_field_lands_on_its_bit() {
        assert_eq!(encode(1, 0, 0, 0, 0), Ok(1 << 0));
        assert_eq!(encode(0, 1, 0, 0, 0), Ok(1 << 1));
        assert_eq!(encode(0, 0, 1, 0, 0), Ok(1 << 2));
        assert_eq!(encode(0, 0, 0, 0, 1), Ok(1 << 3));
        assert_eq!(encode(0, 0, 0, 1, 0), Ok(1 << 8));
        assert_eq!(encode(0, 0, 0, 2, 0), Ok(1 << 9));
        assert_eq!(encode(0, 0, 0, 4, 0), Ok(1 << 10));
        assert_eq!(encode(1, 1, 1, 7, 1), Ok(ascon::CMD.mask() as u32));
    }

    #[test]
    fn fields_are_disjoint() {
        for (i, (_, a)) in FIELDS.iter().enumerate() {
            for (_, b) in FIELDS.iter().skip(i + 1) {
                assert_eq!(a.shifted_mask() & b.shifted_mask(), 0);
            }
        }
    }

    #[test]
    fn overflowing_fields_are_rejected() {
        assert_eq!(
            encode(2, 0, 0, 0, 0),
            Err(Error::FieldOverflow {
                field: "mode",
                value: 2,
                width: 1
            })
        );
        assert_eq!(
            encode(0, 0, 0, 8, 0),
            Err(Error::FieldOverflow {
                field: "type",
                value: 8,
                width: 3
            })
        );
        assert!(encode(0, 0, 0, 0, 0x100).is_err());
        assert!(encode(0, 3, 0, 0, 0).is_err());
    }

    #[test]
    fn encoding_is_injective_and_decodes_back() {
        let mut seen = [false; 1 << 11];
        for mode in 0..2 {
            for eot in 0..2 {
                for eoi in 0..2 {
                    for ty in 0..8 {
                        for eoo in 0..2 {
                            let fields = Fields {
                                mode,
                                eot,
                                eoi,
                                ty,
                                eoo,
                            };
                            let word = fields.encode().unwrap();
                            assert!(!seen[word as usize], "{word:#x} produced twice");
                            seen[word as usize] = true;
                            assert_eq!(Fields::decode(word), fields);
                        }
                    }
                }
            }
        }
        assert_eq!(seen.iter().filter(|s| **s).count(), 128);
    }

    #[test]
    fn typed_commands_round_trip() {
        let cmd = Command::new(Mode::Decrypt, DataType::Msg).eot(true).eoi(true);
        assert_eq!(cmd.encode(), 0x306);
        assert_eq!(Command::decode(cmd.encode()), Ok(cmd));
        assert_eq!(cmd.fields().encode(), Ok(cmd.encode()));

        let tag = Command::new(Mode::Encrypt, DataType::Tag).eoo(true);
        assert_eq!(tag.encode(), 0x409);
        assert_eq!(Command::decode(0x700), Err(Error::UnknownDataType(7)));
    }
}
