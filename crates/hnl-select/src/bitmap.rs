//! Packed cut-based identification bitmap.
//!
//! The bitmap holds ten 3-bit fields, one per cut, each encoding the
//! highest tier the cut passes (0 fail, 1 veto, 2 loose, 3 medium, 4 tight).

/// Number of cuts packed into one bitmap.
pub const N_CUTS: usize = 10;
/// Width of one cut field in bits.
pub const BITS_PER_CUT: u32 = 3;
/// Bits covered by the ten fields.
pub const MEANINGFUL_MASK: u32 = (1 << (N_CUTS as u32 * BITS_PER_CUT)) - 1;

const FIELD_MASK: u32 = 0x7;

/// Decoded tier of each cut, in bitmap order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CutLevels([u8; N_CUTS]);

impl CutLevels {
    /// Unpack `bitmap`; bits above the ten fields are ignored.
    pub fn decode(bitmap: u32) -> Self {
        let mut levels = [0u8; N_CUTS];
        for (i, level) in levels.iter_mut().enumerate() {
            *level = ((bitmap >> (BITS_PER_CUT * i as u32)) & FIELD_MASK) as u8;
        }
        CutLevels(levels)
    }

    /// Build from explicit levels (each must fit in three bits).
    pub fn from_levels(levels: [u8; N_CUTS]) -> Self {
        CutLevels(levels.map(|l| l & FIELD_MASK as u8))
    }

    /// Pack back into the bitmap layout.
    pub fn encode(&self) -> u32 {
        self.0
            .iter()
            .enumerate()
            .fold(0, |acc, (i, &l)| acc | (u32::from(l) << (BITS_PER_CUT * i as u32)))
    }

    /// All ten levels
    pub fn levels(&self) -> &[u8; N_CUTS] {
        &self.0
    }

    pub fn min_pt(&self) -> u8 {
        self.0[0]
    }
    pub fn sc_eta_multi_range(&self) -> u8 {
        self.0[1]
    }
    pub fn deta_in_seed(&self) -> u8 {
        self.0[2]
    }
    pub fn dphi_in(&self) -> u8 {
        self.0[3]
    }
    pub fn full5x5_sigma_ieta_ieta(&self) -> u8 {
        self.0[4]
    }
    pub fn hadronic_over_em_scaled(&self) -> u8 {
        self.0[5]
    }
    pub fn e_inverse_minus_p_inverse(&self) -> u8 {
        self.0[6]
    }
    pub fn rel_pf_iso_scaled(&self) -> u8 {
        self.0[7]
    }
    pub fn conversion_veto(&self) -> u8 {
        self.0[8]
    }
    pub fn missing_hits(&self) -> u8 {
        self.0[9]
    }
}
