//! Guest texture format codes and their block geometry.

use core::fmt;

/// The 6-bit texture format code of a guest fetch constant.
///
/// Names spell out the guest component bit widths; `Fmt` only exists to keep
/// identifiers from starting with a digit.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureFormat {
    Fmt1Reverse = 0,
    Fmt1 = 1,
    Fmt8 = 2,
    Fmt1_5_5_5 = 3,
    Fmt5_6_5 = 4,
    Fmt6_5_5 = 5,
    Fmt8_8_8_8 = 6,
    Fmt2_10_10_10 = 7,
    Fmt8A = 8,
    Fmt8B = 9,
    Fmt8_8 = 10,
    CrY1CbY0Rep = 11,
    Y1CrY0CbRep = 12,
    Fmt16_16Edram = 13,
    Fmt8_8_8_8A = 14,
    Fmt4_4_4_4 = 15,
    Fmt10_11_11 = 16,
    Fmt11_11_10 = 17,
    Dxt1 = 18,
    Dxt2_3 = 19,
    Dxt4_5 = 20,
    Fmt16_16_16_16Edram = 21,
    Fmt24_8 = 22,
    Fmt24_8Float = 23,
    Fmt16 = 24,
    Fmt16_16 = 25,
    Fmt16_16_16_16 = 26,
    Fmt16Expand = 27,
    Fmt16_16Expand = 28,
    Fmt16_16_16_16Expand = 29,
    Fmt16Float = 30,
    Fmt16_16Float = 31,
    Fmt16_16_16_16Float = 32,
    Fmt32 = 33,
    Fmt32_32 = 34,
    Fmt32_32_32_32 = 35,
    Fmt32Float = 36,
    Fmt32_32Float = 37,
    Fmt32_32_32_32Float = 38,
    Fmt32As8 = 39,
    Fmt32As8_8 = 40,
    Fmt16Mpeg = 41,
    Fmt16_16Mpeg = 42,
    Fmt8Interlaced = 43,
    Fmt32As8Interlaced = 44,
    Fmt32As8_8Interlaced = 45,
    Fmt16Interlaced = 46,
    Fmt16MpegInterlaced = 47,
    Fmt16_16MpegInterlaced = 48,
    Dxn = 49,
    Fmt8_8_8_8As16_16_16_16 = 50,
    Dxt1As16_16_16_16 = 51,
    Dxt2_3As16_16_16_16 = 52,
    Dxt4_5As16_16_16_16 = 53,
    Fmt2_10_10_10As16_16_16_16 = 54,
    Fmt10_11_11As16_16_16_16 = 55,
    Fmt11_11_10As16_16_16_16 = 56,
    Fmt32_32_32Float = 57,
    Dxt3A = 58,
    Dxt5A = 59,
    Ctx1 = 60,
    Dxt3AAs1_1_1_1 = 61,
    Fmt8_8_8_8GammaEdram = 62,
    Fmt2_10_10_10FloatEdram = 63,
}

/// Block geometry of a guest format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatInfo {
    pub name: &'static str,
    pub block_width: u32,
    pub block_height: u32,
    pub bits_per_pixel: u32,
}

impl FormatInfo {
    const fn texel(name: &'static str, bits_per_pixel: u32) -> Self {
        Self {
            name,
            block_width: 1,
            block_height: 1,
            bits_per_pixel,
        }
    }

    const fn block(
        name: &'static str,
        block_width: u32,
        block_height: u32,
        bits_per_pixel: u32,
    ) -> Self {
        Self {
            name,
            block_width,
            block_height,
            bits_per_pixel,
        }
    }

    pub const fn is_compressed(&self) -> bool {
        self.block_width != 1 || self.block_height != 1
    }

    /// Bytes in one block. Sub-byte 1bpp formats report 0.
    pub const fn bytes_per_block(&self) -> u32 {
        self.block_width * self.block_height * self.bits_per_pixel / 8
    }
}

static FORMAT_INFOS: [FormatInfo; TextureFormat::COUNT] = [
    FormatInfo::texel("k_1_REVERSE", 1),
    FormatInfo::texel("k_1", 1),
    FormatInfo::texel("k_8", 8),
    FormatInfo::texel("k_1_5_5_5", 16),
    FormatInfo::texel("k_5_6_5", 16),
    FormatInfo::texel("k_6_5_5", 16),
    FormatInfo::texel("k_8_8_8_8", 32),
    FormatInfo::texel("k_2_10_10_10", 32),
    FormatInfo::texel("k_8_A", 8),
    FormatInfo::texel("k_8_B", 8),
    FormatInfo::texel("k_8_8", 16),
    FormatInfo::block("k_Cr_Y1_Cb_Y0_REP", 2, 1, 16),
    FormatInfo::block("k_Y1_Cr_Y0_Cb_REP", 2, 1, 16),
    FormatInfo::texel("k_16_16_EDRAM", 32),
    FormatInfo::texel("k_8_8_8_8_A", 32),
    FormatInfo::texel("k_4_4_4_4", 16),
    FormatInfo::texel("k_10_11_11", 32),
    FormatInfo::texel("k_11_11_10", 32),
    FormatInfo::block("k_DXT1", 4, 4, 4),
    FormatInfo::block("k_DXT2_3", 4, 4, 8),
    FormatInfo::block("k_DXT4_5", 4, 4, 8),
    FormatInfo::texel("k_16_16_16_16_EDRAM", 64),
    FormatInfo::texel("k_24_8", 32),
    FormatInfo::texel("k_24_8_FLOAT", 32),
    FormatInfo::texel("k_16", 16),
    FormatInfo::texel("k_16_16", 32),
    FormatInfo::texel("k_16_16_16_16", 64),
    FormatInfo::texel("k_16_EXPAND", 16),
    FormatInfo::texel("k_16_16_EXPAND", 32),
    FormatInfo::texel("k_16_16_16_16_EXPAND", 64),
    FormatInfo::texel("k_16_FLOAT", 16),
    FormatInfo::texel("k_16_16_FLOAT", 32),
    FormatInfo::texel("k_16_16_16_16_FLOAT", 64),
    FormatInfo::texel("k_32", 32),
    FormatInfo::texel("k_32_32", 64),
    FormatInfo::texel("k_32_32_32_32", 128),
    FormatInfo::texel("k_32_FLOAT", 32),
    FormatInfo::texel("k_32_32_FLOAT", 64),
    FormatInfo::texel("k_32_32_32_32_FLOAT", 128),
    FormatInfo::block("k_32_AS_8", 4, 1, 8),
    FormatInfo::block("k_32_AS_8_8", 2, 1, 16),
    FormatInfo::texel("k_16_MPEG", 16),
    FormatInfo::texel("k_16_16_MPEG", 32),
    FormatInfo::texel("k_8_INTERLACED", 8),
    FormatInfo::block("k_32_AS_8_INTERLACED", 4, 1, 8),
    FormatInfo::block("k_32_AS_8_8_INTERLACED", 2, 1, 16),
    FormatInfo::texel("k_16_INTERLACED", 16),
    FormatInfo::texel("k_16_MPEG_INTERLACED", 16),
    FormatInfo::texel("k_16_16_MPEG_INTERLACED", 32),
    FormatInfo::block("k_DXN", 4, 4, 8),
    FormatInfo::texel("k_8_8_8_8_AS_16_16_16_16", 32),
    FormatInfo::block("k_DXT1_AS_16_16_16_16", 4, 4, 4),
    FormatInfo::block("k_DXT2_3_AS_16_16_16_16", 4, 4, 8),
    FormatInfo::block("k_DXT4_5_AS_16_16_16_16", 4, 4, 8),
    FormatInfo::texel("k_2_10_10_10_AS_16_16_16_16", 32),
    FormatInfo::texel("k_10_11_11_AS_16_16_16_16", 32),
    FormatInfo::texel("k_11_11_10_AS_16_16_16_16", 32),
    FormatInfo::texel("k_32_32_32_FLOAT", 96),
    FormatInfo::block("k_DXT3A", 4, 4, 4),
    FormatInfo::block("k_DXT5A", 4, 4, 4),
    FormatInfo::block("k_CTX1", 4, 4, 4),
    FormatInfo::block("k_DXT3A_AS_1_1_1_1", 4, 4, 4),
    FormatInfo::texel("k_8_8_8_8_GAMMA_EDRAM", 32),
    FormatInfo::texel("k_2_10_10_10_FLOAT_EDRAM", 32),
];

impl TextureFormat {
    pub const COUNT: usize = 64;

    pub fn from_u32(value: u32) -> Option<Self> {
        use TextureFormat::*;
        Some(match value {
            0 => Fmt1Reverse,
            1 => Fmt1,
            2 => Fmt8,
            3 => Fmt1_5_5_5,
            4 => Fmt5_6_5,
            5 => Fmt6_5_5,
            6 => Fmt8_8_8_8,
            7 => Fmt2_10_10_10,
            8 => Fmt8A,
            9 => Fmt8B,
            10 => Fmt8_8,
            11 => CrY1CbY0Rep,
            12 => Y1CrY0CbRep,
            13 => Fmt16_16Edram,
            14 => Fmt8_8_8_8A,
            15 => Fmt4_4_4_4,
            16 => Fmt10_11_11,
            17 => Fmt11_11_10,
            18 => Dxt1,
            19 => Dxt2_3,
            20 => Dxt4_5,
            21 => Fmt16_16_16_16Edram,
            22 => Fmt24_8,
            23 => Fmt24_8Float,
            24 => Fmt16,
            25 => Fmt16_16,
            26 => Fmt16_16_16_16,
            27 => Fmt16Expand,
            28 => Fmt16_16Expand,
            29 => Fmt16_16_16_16Expand,
            30 => Fmt16Float,
            31 => Fmt16_16Float,
            32 => Fmt16_16_16_16Float,
            33 => Fmt32,
            34 => Fmt32_32,
            35 => Fmt32_32_32_32,
            36 => Fmt32Float,
            37 => Fmt32_32Float,
            38 => Fmt32_32_32_32Float,
            39 => Fmt32As8,
            40 => Fmt32As8_8,
            41 => Fmt16Mpeg,
            42 => Fmt16_16Mpeg,
            43 => Fmt8Interlaced,
            44 => Fmt32As8Interlaced,
            45 => Fmt32As8_8Interlaced,
            46 => Fmt16Interlaced,
            47 => Fmt16MpegInterlaced,
            48 => Fmt16_16MpegInterlaced,
            49 => Dxn,
            50 => Fmt8_8_8_8As16_16_16_16,
            51 => Dxt1As16_16_16_16,
            52 => Dxt2_3As16_16_16_16,
            53 => Dxt4_5As16_16_16_16,
            54 => Fmt2_10_10_10As16_16_16_16,
            55 => Fmt10_11_11As16_16_16_16,
            56 => Fmt11_11_10As16_16_16_16,
            57 => Fmt32_32_32Float,
            58 => Dxt3A,
            59 => Dxt5A,
            60 => Ctx1,
            61 => Dxt3AAs1_1_1_1,
            62 => Fmt8_8_8_8GammaEdram,
            63 => Fmt2_10_10_10FloatEdram,
            _ => return None,
        })
    }

    /// Every format, in code order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..Self::COUNT as u32).filter_map(Self::from_u32)
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn info(self) -> &'static FormatInfo {
        &FORMAT_INFOS[self.index()]
    }
}

impl fmt::Display for TextureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.info().name)
    }
}
