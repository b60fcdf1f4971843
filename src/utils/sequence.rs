use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::config::defs::PHRED_OFFSET;

/// Nucleotide classes counted per read position. Anything outside ACGT is N.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nucleotide {
    A,
    C,
    G,
    T,
    N,
}

impl Nucleotide {
    pub const CALLABLE: [Nucleotide; 4] = [Nucleotide::A, Nucleotide::C, Nucleotide::G, Nucleotide::T];

    #[inline]
    pub fn from_ascii(base: u8) -> Nucleotide {
        match base {
            b'A' => Nucleotide::A,
            b'C' => Nucleotide::C,
            b'G' => Nucleotide::G,
            b'T' => Nucleotide::T,
            _ => Nucleotide::N,
        }
    }

    /// Slot in a five-class count array (A=0 .. T=3, N=4).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Nucleotide::A => 0,
            Nucleotide::C => 1,
            Nucleotide::G => 2,
            Nucleotide::T => 3,
            Nucleotide::N => 4,
        }
    }

    /// Slot in a four-class weight array; N has none.
    #[inline]
    pub fn callable_index(self) -> Option<usize> {
        match self {
            Nucleotide::N => None,
            other => Some(other.index()),
        }
    }

    pub fn to_ascii(self) -> u8 {
        match self {
            Nucleotide::A => b'A',
            Nucleotide::C => b'C',
            Nucleotide::G => b'G',
            Nucleotide::T => b'T',
            Nucleotide::N => b'N',
        }
    }

    /// Generate a random callable nucleotide with a provided RNG.
    pub fn random_with_rng<R: Rng + ?Sized>(rng: &mut R) -> Nucleotide {
        Nucleotide::CALLABLE[rng.random_range(0..Nucleotide::CALLABLE.len())]
    }

    /// Generate a random ACGT sequence of the given length.
    pub fn random_sequence<R: Rng + ?Sized>(rng: &mut R, length: usize) -> Vec<u8> {
        (0..length).map(|_| Nucleotide::random_with_rng(rng).to_ascii()).collect()
    }
}


fn phred33(score: u8) -> u8 {
    score + PHRED_OFFSET
}

fn normal_phred_qual<R: Rng + ?Sized>(rng: &mut R, normal: &Normal<f32>) -> u8 {
    let mut raw_phred = -1.0;
    while raw_phred < 0.0 || raw_phred > 40.0 {
        raw_phred = normal.sample(rng);
    }
    phred33(raw_phred as u8)
}

/// Phred+33 quality string drawn from a normal distribution truncated to [0, 40].
pub fn normal_phred_qual_string<R: Rng + ?Sized>(rng: &mut R, length: usize, mean: f32, stdev: f32) -> Vec<u8> {
    let normal = match Normal::new(mean, stdev) {
        Ok(normal) => normal,
        Err(_) => return vec![phred33(mean.clamp(0.0, 40.0) as u8); length],
    };
    (0..length).map(|_| normal_phred_qual(rng, &normal)).collect()
}
