//! Channel swizzles and per-channel signedness.
//!
//! A swizzle packs four 3-bit selectors (R, G, B, A of the result, lowest bits
//! first). Selectors 0-3 pick a source channel, 4 forces 0 and 5 forces 1. The
//! encoding matches the host's 4-component view mapping, so a swizzle can be
//! handed to a view description unchanged.

/// Source of one swizzled channel.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SwizzleSource {
    X = 0,
    Y = 1,
    Z = 2,
    W = 3,
    Zero = 4,
    One = 5,
}

impl SwizzleSource {
    pub fn from_bits(bits: u16) -> Self {
        match bits & 0b111 {
            0 => Self::X,
            1 => Self::Y,
            2 => Self::Z,
            3 => Self::W,
            5 => Self::One,
            // 6 and 7 are unused by the hardware and read as zero.
            _ => Self::Zero,
        }
    }

    pub const fn is_constant(self) -> bool {
        (self as u8) & 0b100 != 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Swizzle(u16);

impl Swizzle {
    pub const RGBA: Self = Self::new([
        SwizzleSource::X,
        SwizzleSource::Y,
        SwizzleSource::Z,
        SwizzleSource::W,
    ]);
    pub const RRRR: Self = Self::new([SwizzleSource::X; 4]);
    pub const RGGG: Self = Self::new([
        SwizzleSource::X,
        SwizzleSource::Y,
        SwizzleSource::Y,
        SwizzleSource::Y,
    ]);
    pub const RGBB: Self = Self::new([
        SwizzleSource::X,
        SwizzleSource::Y,
        SwizzleSource::Z,
        SwizzleSource::Z,
    ]);
    pub const BGRR: Self = Self::new([
        SwizzleSource::Z,
        SwizzleSource::Y,
        SwizzleSource::X,
        SwizzleSource::X,
    ]);
    pub const RBGG: Self = Self::new([
        SwizzleSource::X,
        SwizzleSource::Z,
        SwizzleSource::Y,
        SwizzleSource::Y,
    ]);
    pub const ZERO: Self = Self::new([SwizzleSource::Zero; 4]);

    pub const fn new(sources: [SwizzleSource; 4]) -> Self {
        Self(
            sources[0] as u16
                | (sources[1] as u16) << 3
                | (sources[2] as u16) << 6
                | (sources[3] as u16) << 9,
        )
    }

    /// Builds a swizzle from the 12-bit field of a fetch constant.
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits & 0xFFF)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub fn source(self, channel: usize) -> SwizzleSource {
        debug_assert!(channel < 4);
        SwizzleSource::from_bits(self.0 >> (channel * 3))
    }

    pub fn sources(self) -> [SwizzleSource; 4] {
        [0, 1, 2, 3].map(|channel| self.source(channel))
    }

    /// Applies `self` on top of the host format's own swizzle: channels that
    /// select a source go through `host`, constant channels stay constant.
    pub fn compose(self, host: Swizzle) -> Swizzle {
        Swizzle::new(self.sources().map(|source| {
            if source.is_constant() {
                source
            } else {
                host.source(source as usize)
            }
        }))
    }
}

impl Default for Swizzle {
    fn default() -> Self {
        Self::RGBA
    }
}

/// Number format of one guest texture channel.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureSign {
    Unsigned = 0,
    Signed = 1,
    UnsignedBiased = 2,
    Gamma = 3,
}

impl TextureSign {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::Unsigned,
            1 => Self::Signed,
            2 => Self::UnsignedBiased,
            _ => Self::Gamma,
        }
    }
}

/// Signs of the four channels after swizzling, 2 bits each.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct SwizzledSigns(u8);

impl SwizzledSigns {
    pub const UNSIGNED: Self = Self(0);

    pub const fn splat(sign: TextureSign) -> Self {
        let s = sign as u8;
        Self(s | s << 2 | s << 4 | s << 6)
    }

    /// Signs as seen by the shader after `swizzle` is applied to channels with
    /// `signs`.
    ///
    /// Constant channels don't read the texture, so they take whichever sign
    /// avoids needing a second view: signed if every fetched channel is signed,
    /// unsigned otherwise.
    pub fn from_swizzle(swizzle: Swizzle, signs: [TextureSign; 4]) -> Self {
        let mut bits = 0u8;
        let mut any_signed = false;
        let mut any_not_signed = false;
        let mut constant_mask = 0u8;
        for (channel, source) in swizzle.sources().into_iter().enumerate() {
            if source.is_constant() {
                constant_mask |= 1 << channel;
                continue;
            }
            let sign = signs[source as usize];
            if sign == TextureSign::Signed {
                any_signed = true;
            } else {
                any_not_signed = true;
            }
            bits |= (sign as u8) << (channel * 2);
        }
        let constant_sign = if any_signed && !any_not_signed {
            TextureSign::Signed
        } else {
            TextureSign::Unsigned
        };
        for channel in 0..4 {
            if constant_mask & (1 << channel) != 0 {
                bits |= (constant_sign as u8) << (channel * 2);
            }
        }
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn sign(self, channel: usize) -> TextureSign {
        debug_assert!(channel < 4);
        TextureSign::from_bits(self.0 >> (channel * 2))
    }

    /// Whether any channel needs the signed view.
    pub fn is_any_signed(self) -> bool {
        (0..4).any(|channel| self.sign(channel) == TextureSign::Signed)
    }

    /// Whether any channel needs the unsigned view.
    pub fn is_any_not_signed(self) -> bool {
        (0..4).any(|channel| self.sign(channel) != TextureSign::Signed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn encoding_matches_host_component_mapping() {
        assert_eq!(Swizzle::RGBA.bits(), 0b011_010_001_000);
        assert_eq!(Swizzle::ZERO.bits(), 0b100_100_100_100);
        assert_eq!(Swizzle::from_bits(0xFFFF).bits(), 0xFFF);
    }

    #[test]
    fn compose_routes_through_host_swizzle() {
        // Guest asks for ABGR of a format the host stores as BGRR.
        let guest = Swizzle::new([
            SwizzleSource::W,
            SwizzleSource::Z,
            SwizzleSource::Y,
            SwizzleSource::One,
        ]);
        let composed = guest.compose(Swizzle::BGRR);
        assert_eq!(
            composed.sources(),
            [
                SwizzleSource::X,
                SwizzleSource::X,
                SwizzleSource::Y,
                SwizzleSource::One
            ]
        );
        assert_eq!(Swizzle::RGBA.compose(Swizzle::RGGG), Swizzle::RGGG);
    }

    #[test]
    fn constant_channels_follow_fetched_signs() {
        let swizzle = Swizzle::new([
            SwizzleSource::X,
            SwizzleSource::Y,
            SwizzleSource::Zero,
            SwizzleSource::One,
        ]);

        let all_signed = SwizzledSigns::from_swizzle(swizzle, [TextureSign::Signed; 4]);
        assert_eq!(all_signed, SwizzledSigns::splat(TextureSign::Signed));
        assert!(all_signed.is_any_signed());
        assert!(!all_signed.is_any_not_signed());

        let mixed = SwizzledSigns::from_swizzle(
            swizzle,
            [
                TextureSign::Signed,
                TextureSign::Unsigned,
                TextureSign::Signed,
                TextureSign::Signed,
            ],
        );
        assert_eq!(mixed.sign(0), TextureSign::Signed);
        assert_eq!(mixed.sign(1), TextureSign::Unsigned);
        assert_eq!(mixed.sign(2), TextureSign::Unsigned);
        assert!(mixed.is_any_signed());
        assert!(mixed.is_any_not_signed());
    }

    #[test]
    fn unsigned_signs_need_only_unsigned_view() {
        let signs = SwizzledSigns::from_swizzle(Swizzle::RGBA, [TextureSign::Gamma; 4]);
        assert!(!signs.is_any_signed());
        assert!(signs.is_any_not_signed());
        assert!(!SwizzledSigns::UNSIGNED.is_any_signed());
    }
}
