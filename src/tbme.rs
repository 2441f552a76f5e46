//! Antisymmetrized, J-coupled two-body matrix elements.
//!
//! Matrix elements are stored per channel pair `(ch_bra, ch_ket)` with
//! `ch_bra ≤ ch_ket`, as dense matrices over the canonical kets `(p ≤ q)`
//! of each channel.  The stored ("reduced") value is the matrix element
//! between normalized antisymmetrized states.  Accessors with a `_norm`
//! suffix instead work with the physical value
//!
//! ```text
//! stored × √((1 + δab) (1 + δcd))
//! ```
//!
//! Orbit pairs given in non-canonical order `a > b` are served from the
//! canonical cell using the exchange phase `−(−1)^(ja + jb − J)`.
use std::collections::{btree_map, BTreeMap};
use std::{fmt, io, ops, ptr};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rand::Rng;
use super::ang_mom::{isospin_cg, jweight, phase};
use super::basis::{Ket, Orbit};
use super::half::Half;
use super::io::invalid_data;
use super::matrix::Matrix;
use super::model_space::{Jpt, ModelSpace, TwoBodyChannel};
use super::parity::{sort2, Parity};
use super::utils::cast;

quick_error! {
    #[derive(Clone, Debug, PartialEq)]
    pub enum Error {
        Lookup(ch_bra: usize, ch_ket: usize) {
            display("channel pair ({}, {}) is not allocated", ch_bra, ch_ket)
        }
        NoChannel(jpt: Jpt) {
            display("no two-body channel with {}", jpt)
        }
        Selection(msg: String) {
            display("selection rule violated: {}", msg)
        }
        ShapeMismatch(msg: String) {
            display("incompatible operators: {}", msg)
        }
    }
}

/// Relation between a matrix element and its transpose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symmetry {
    Hermitian,
    AntiHermitian,
    General,
}

impl Default for Symmetry {
    fn default() -> Self {
        Symmetry::Hermitian
    }
}

impl Symmetry {
    /// `s` in `V(ket, bra) = s V(bra, ket)`, if there is such a relation.
    #[inline]
    pub fn conj_sign(self) -> Option<f64> {
        match self {
            Symmetry::Hermitian => Some(1.0),
            Symmetry::AntiHermitian => Some(-1.0),
            Symmetry::General => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conf {
    pub rank_j: i32,
    pub rank_t: i32,
    pub parity: Parity,
    pub symmetry: Symmetry,
}

impl Default for Conf {
    fn default() -> Self {
        Self {
            rank_j: 0,
            rank_t: 0,
            parity: Parity::Even,
            symmetry: Symmetry::Hermitian,
        }
    }
}

impl Conf {
    pub fn make_tbme<'a>(&self, model_space: &'a ModelSpace) -> TwoBodyMe<'a> {
        let mut op = TwoBodyMe::new_tensor(
            model_space, self.rank_j, self.rank_t, self.parity);
        op.set_symmetry(self.symmetry);
        op
    }
}

/// A ket resolved to its channel and in-channel index.
#[derive(Clone, Copy, Debug)]
struct ReifiedKet {
    chan: usize,
    aux: usize,
    j: i32,
    /// exchange phase for non-canonical order
    phase: f64,
    /// `√(1 + δpq)`
    norm: f64,
}

#[derive(Clone, Copy, Debug)]
enum Put {
    Set,
    Add,
}

impl Put {
    #[inline]
    fn apply(self, x: &mut f64, value: f64) {
        match self {
            Put::Set => *x = value,
            Put::Add => *x += value,
        }
    }
}

fn reify_in(ch: usize, chan: &TwoBodyChannel, a: usize, b: usize)
            -> Option<ReifiedKet> {
    let (perm, p, q) = sort2(a, b);
    let aux = chan.local_index(p, q)?;
    let ket = chan.ket(aux)?;
    Some(ReifiedKet {
        chan: ch,
        aux,
        j: chan.j(),
        phase: match perm {
            Parity::Even => 1.0,
            Parity::Odd => ket.phase(chan.j()),
        },
        norm: ket.norm(),
    })
}

/// Two-body operator of tensor rank `(rank_j, rank_t, parity)` stored in a
/// channel-sparse layout over a `ModelSpace`.
#[derive(Clone, Debug)]
pub struct TwoBodyMe<'a> {
    model_space: &'a ModelSpace,
    mat_el: BTreeMap<(usize, usize), Matrix<f64>>,
    num_chans: usize,
    symmetry: Symmetry,
    rank_j: i32,
    rank_t: i32,
    parity: Parity,
    allocated: bool,
}

impl<'a> TwoBodyMe<'a> {
    /// Scalar, Hermitian, zero operator.
    pub fn new(model_space: &'a ModelSpace) -> Self {
        Self::new_tensor(model_space, 0, 0, Parity::Even)
    }

    pub fn new_tensor(model_space: &'a ModelSpace, rank_j: i32, rank_t: i32,
                      parity: Parity) -> Self {
        let mut op = Self::unallocated(model_space, rank_j, rank_t, parity);
        op.allocate();
        op
    }

    /// Metadata only; every element access fails until `allocate` is called.
    pub fn unallocated(model_space: &'a ModelSpace, rank_j: i32, rank_t: i32,
                       parity: Parity) -> Self {
        Self {
            model_space,
            mat_el: BTreeMap::new(),
            num_chans: 0,
            symmetry: Symmetry::Hermitian,
            rank_j,
            rank_t,
            parity,
            allocated: false,
        }
    }

    /// Create a zero matrix for every channel pair allowed by the selection
    /// rules, discarding any existing contents.
    pub fn allocate(&mut self) {
        self.mat_el = self.layout().into_iter()
            .map(|(key, (nrows, ncols))| (key, Matrix::zeros(nrows, ncols)))
            .collect();
        self.num_chans = self.model_space.num_channels();
        self.allocated = true;
    }

    pub fn deallocate(&mut self) {
        self.mat_el = BTreeMap::new();
        self.allocated = false;
    }

    #[inline]
    pub fn is_allocated(&self) -> bool {
        self.allocated
    }

    /// Number of channels at the time of allocation.
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.num_chans
    }

    #[inline]
    pub fn model_space(&self) -> &'a ModelSpace {
        self.model_space
    }

    #[inline]
    pub fn rank_j(&self) -> i32 {
        self.rank_j
    }

    #[inline]
    pub fn rank_t(&self) -> i32 {
        self.rank_t
    }

    #[inline]
    pub fn parity(&self) -> Parity {
        self.parity
    }

    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.rank_j == 0 && self.rank_t == 0 && self.parity == Parity::Even
    }

    #[inline]
    pub fn symmetry(&self) -> Symmetry {
        self.symmetry
    }

    /// Only changes how elements are propagated and mirrored; the stored
    /// values are left alone.
    #[inline]
    pub fn set_symmetry(&mut self, symmetry: Symmetry) {
        self.symmetry = symmetry;
    }

    pub fn set_hermitian(&mut self) {
        self.set_symmetry(Symmetry::Hermitian);
    }

    pub fn set_anti_hermitian(&mut self) {
        self.set_symmetry(Symmetry::AntiHermitian);
    }

    pub fn set_non_hermitian(&mut self) {
        self.set_symmetry(Symmetry::General);
    }

    pub fn is_hermitian(&self) -> bool {
        self.symmetry == Symmetry::Hermitian
    }

    pub fn is_anti_hermitian(&self) -> bool {
        self.symmetry == Symmetry::AntiHermitian
    }

    pub fn is_non_hermitian(&self) -> bool {
        self.symmetry == Symmetry::General
    }

    /// Whether the operator connects the two channels.
    pub fn connects(&self, bra: Jpt, ket: Jpt) -> bool {
        (bra.j - ket.j).abs() <= self.rank_j
            && self.rank_j <= bra.j + ket.j
            && (bra.tz - ket.tz).abs() <= self.rank_t
            && bra.p + ket.p + self.parity == Parity::Even
    }

    /// Keys and dimensions of every block this operator must hold.
    fn layout(&self) -> Vec<((usize, usize), (usize, usize))> {
        let chans = self.model_space.channels();
        let mut layout = Vec::new();
        for (ch_bra, bra) in chans.iter().enumerate() {
            for (ch_ket, ket) in chans.iter().enumerate().skip(ch_bra) {
                if self.connects(bra.jpt, ket.jpt) {
                    layout.push(((ch_bra, ch_ket),
                                 (bra.num_kets(), ket.num_kets())));
                }
            }
        }
        layout
    }

    /// Stored block for `ch_bra ≤ ch_ket`.
    pub fn get_matrix(&self, ch_bra: usize, ch_ket: usize)
                      -> Result<&Matrix<f64>, Error> {
        self.mat_el.get(&(ch_bra, ch_ket))
            .ok_or(Error::Lookup(ch_bra, ch_ket))
    }

    pub fn get_matrix_mut(&mut self, ch_bra: usize, ch_ket: usize)
                          -> Result<&mut Matrix<f64>, Error> {
        self.mat_el.get_mut(&(ch_bra, ch_ket))
            .ok_or(Error::Lookup(ch_bra, ch_ket))
    }

    /// Stored blocks in ascending `(ch_bra, ch_ket)` order.
    pub fn blocks(&self) -> btree_map::Iter<(usize, usize), Matrix<f64>> {
        self.mat_el.iter()
    }

    pub fn blocks_mut(&mut self)
                      -> btree_map::IterMut<(usize, usize), Matrix<f64>> {
        self.mat_el.iter_mut()
    }

    ////////////////////////////////////////////////////////////////////////
    // Resolution

    fn channel(&self, ch: usize) -> Result<&'a TwoBodyChannel, Error> {
        self.model_space.channel(ch).ok_or_else(|| {
            Error::Selection(format!("channel {} does not exist", ch))
        })
    }

    fn orbit(&self, a: usize) -> Result<&'a Orbit, Error> {
        self.model_space.orbit(a).ok_or_else(|| {
            Error::Selection(format!("orbit {} does not exist", a))
        })
    }

    fn reify_orbits(&self, ch: usize, a: usize, b: usize)
                    -> Result<ReifiedKet, Error> {
        let chan = self.channel(ch)?;
        reify_in(ch, chan, a, b).ok_or_else(|| Error::Selection(format!(
            "orbits ({}, {}) are not in channel {} ({})",
            a, b, ch, chan.jpt)))
    }

    fn reify_index(&self, ch: usize, i: usize) -> Result<ReifiedKet, Error> {
        let chan = self.channel(ch)?;
        let ket = chan.ket(i).ok_or_else(|| Error::Selection(format!(
            "index {} is out of range for channel {} ({})",
            i, ch, chan.jpt)))?;
        Ok(ReifiedKet {
            chan: ch,
            aux: i,
            j: chan.j(),
            phase: 1.0,
            norm: ket.norm(),
        })
    }

    fn reify_jpt(&self, jpt: Jpt, a: usize, b: usize)
                 -> Result<ReifiedKet, Error> {
        let ch = self.model_space.channel_index(jpt)
            .ok_or(Error::NoChannel(jpt))?;
        self.reify_orbits(ch, a, b)
    }

    /// `None` if `(a, b)` cannot couple to `j`, in which case every
    /// element involving that state vanishes identically.
    fn reify_j(&self, j: i32, a: usize, b: usize)
               -> Result<Option<ReifiedKet>, Error> {
        self.orbit(a)?;
        self.orbit(b)?;
        let ms = self.model_space;
        Ok(ms.pair_jpt(a, b, j)
           .and_then(|jpt| ms.channel_index(jpt))
           .and_then(|ch| reify_in(ch, &ms.channels()[ch], a, b)))
    }

    fn require_j(&self, j: i32, a: usize, b: usize)
                 -> Result<ReifiedKet, Error> {
        self.reify_j(j, a, b)?.ok_or_else(|| Error::Selection(format!(
            "orbits ({}, {}) cannot couple to J = {}", a, b, j)))
    }

    fn require_scalar(&self, what: &str) -> Result<(), Error> {
        if self.is_scalar() {
            Ok(())
        } else {
            Err(Error::Selection(format!(
                "{} requires a scalar operator, not rank ({}, {}, {})",
                what, self.rank_j, self.rank_t, self.parity)))
        }
    }

    ////////////////////////////////////////////////////////////////////////
    // Core read and write

    fn mirror_sign(&self, bra: &ReifiedKet, ket: &ReifiedKet)
                   -> Result<f64, Error> {
        match self.symmetry.conj_sign() {
            Some(s) => Ok(s * phase(bra.j - ket.j)),
            None => Err(Error::Lookup(bra.chan, ket.chan)),
        }
    }

    fn at(&self, bra: &ReifiedKet, ket: &ReifiedKet) -> Result<f64, Error> {
        let phase = bra.phase * ket.phase;
        if bra.chan <= ket.chan {
            let m = self.get_matrix(bra.chan, ket.chan)?;
            Ok(phase * m[(bra.aux, ket.aux)])
        } else {
            let sign = self.mirror_sign(bra, ket)?;
            let m = self.get_matrix(ket.chan, bra.chan)?;
            Ok(phase * sign * m[(ket.aux, bra.aux)])
        }
    }

    fn put(&mut self, bra: &ReifiedKet, ket: &ReifiedKet, value: f64,
           mode: Put, conj: bool) -> Result<(), Error> {
        let mut value = value * bra.phase * ket.phase;
        let (bra, ket) = if bra.chan <= ket.chan {
            (bra, ket)
        } else {
            value *= self.mirror_sign(bra, ket)?;
            (ket, bra)
        };
        let conj_sign = if conj && bra.chan == ket.chan && bra.aux != ket.aux {
            self.symmetry.conj_sign()
        } else {
            None
        };
        let m = self.get_matrix_mut(bra.chan, ket.chan)?;
        mode.apply(&mut m[(bra.aux, ket.aux)], value);
        if let Some(s) = conj_sign {
            mode.apply(&mut m[(ket.aux, bra.aux)], s * value);
        }
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////
    // Channel + orbits

    pub fn get_tbme(&self, ch_bra: usize, ch_ket: usize,
                    a: usize, b: usize, c: usize, d: usize)
                    -> Result<f64, Error> {
        let bra = self.reify_orbits(ch_bra, a, b)?;
        let ket = self.reify_orbits(ch_ket, c, d)?;
        self.at(&bra, &ket)
    }

    pub fn get_tbme_norm(&self, ch_bra: usize, ch_ket: usize,
                         a: usize, b: usize, c: usize, d: usize)
                         -> Result<f64, Error> {
        let bra = self.reify_orbits(ch_bra, a, b)?;
        let ket = self.reify_orbits(ch_ket, c, d)?;
        Ok(self.at(&bra, &ket)? * bra.norm * ket.norm)
    }

    /// Also sets the conjugate element if the operator is (anti-)Hermitian.
    pub fn set_tbme(&mut self, ch_bra: usize, ch_ket: usize,
                    a: usize, b: usize, c: usize, d: usize, value: f64)
                    -> Result<(), Error> {
        let bra = self.reify_orbits(ch_bra, a, b)?;
        let ket = self.reify_orbits(ch_ket, c, d)?;
        self.put(&bra, &ket, value, Put::Set, true)
    }

    pub fn set_tbme_norm(&mut self, ch_bra: usize, ch_ket: usize,
                         a: usize, b: usize, c: usize, d: usize, value: f64)
                         -> Result<(), Error> {
        let bra = self.reify_orbits(ch_bra, a, b)?;
        let ket = self.reify_orbits(ch_ket, c, d)?;
        self.put(&bra, &ket, value / (bra.norm * ket.norm), Put::Set, true)
    }

    pub fn add_to_tbme(&mut self, ch_bra: usize, ch_ket: usize,
                       a: usize, b: usize, c: usize, d: usize, value: f64)
                       -> Result<(), Error> {
        let bra = self.reify_orbits(ch_bra, a, b)?;
        let ket = self.reify_orbits(ch_ket, c, d)?;
        self.put(&bra, &ket, value, Put::Add, true)
    }

    /// Adds to the addressed element only.  The caller is responsible for
    /// restoring the symmetry of the operator.
    pub fn add_to_tbme_non_herm(&mut self, ch_bra: usize, ch_ket: usize,
                                a: usize, b: usize, c: usize, d: usize,
                                value: f64) -> Result<(), Error> {
        let bra = self.reify_orbits(ch_bra, a, b)?;
        let ket = self.reify_orbits(ch_ket, c, d)?;
        self.put(&bra, &ket, value, Put::Add, false)
    }

    ////////////////////////////////////////////////////////////////////////
    // Channel + kets

    pub fn get_tbme_ket(&self, ch_bra: usize, ch_ket: usize,
                        bra: &Ket, ket: &Ket) -> Result<f64, Error> {
        self.get_tbme(ch_bra, ch_ket, bra.p, bra.q, ket.p, ket.q)
    }

    pub fn get_tbme_ket_norm(&self, ch_bra: usize, ch_ket: usize,
                             bra: &Ket, ket: &Ket) -> Result<f64, Error> {
        self.get_tbme_norm(ch_bra, ch_ket, bra.p, bra.q, ket.p, ket.q)
    }

    pub fn set_tbme_ket(&mut self, ch_bra: usize, ch_ket: usize,
                        bra: &Ket, ket: &Ket, value: f64)
                        -> Result<(), Error> {
        self.set_tbme(ch_bra, ch_ket, bra.p, bra.q, ket.p, ket.q, value)
    }

    pub fn add_to_tbme_ket(&mut self, ch_bra: usize, ch_ket: usize,
                           bra: &Ket, ket: &Ket, value: f64)
                           -> Result<(), Error> {
        self.add_to_tbme(ch_bra, ch_ket, bra.p, bra.q, ket.p, ket.q, value)
    }

    ////////////////////////////////////////////////////////////////////////
    // Channel + in-channel indices

    pub fn get_tbme_idx(&self, ch_bra: usize, ch_ket: usize,
                        ibra: usize, iket: usize) -> Result<f64, Error> {
        let bra = self.reify_index(ch_bra, ibra)?;
        let ket = self.reify_index(ch_ket, iket)?;
        self.at(&bra, &ket)
    }

    pub fn get_tbme_norm_idx(&self, ch_bra: usize, ch_ket: usize,
                             ibra: usize, iket: usize) -> Result<f64, Error> {
        let bra = self.reify_index(ch_bra, ibra)?;
        let ket = self.reify_index(ch_ket, iket)?;
        Ok(self.at(&bra, &ket)? * bra.norm * ket.norm)
    }

    pub fn set_tbme_idx(&mut self, ch_bra: usize, ch_ket: usize,
                        ibra: usize, iket: usize, value: f64)
                        -> Result<(), Error> {
        let bra = self.reify_index(ch_bra, ibra)?;
        let ket = self.reify_index(ch_ket, iket)?;
        self.put(&bra, &ket, value, Put::Set, true)
    }

    pub fn add_to_tbme_idx(&mut self, ch_bra: usize, ch_ket: usize,
                           ibra: usize, iket: usize, value: f64)
                           -> Result<(), Error> {
        let bra = self.reify_index(ch_bra, ibra)?;
        let ket = self.reify_index(ch_ket, iket)?;
        self.put(&bra, &ket, value, Put::Add, true)
    }

    pub fn add_to_tbme_non_herm_idx(&mut self, ch_bra: usize, ch_ket: usize,
                                    ibra: usize, iket: usize, value: f64)
                                    -> Result<(), Error> {
        let bra = self.reify_index(ch_bra, ibra)?;
        let ket = self.reify_index(ch_ket, iket)?;
        self.put(&bra, &ket, value, Put::Add, false)
    }

    ////////////////////////////////////////////////////////////////////////
    // Quantum numbers + orbits or kets

    pub fn get_tbme_jpt(&self, bra_qn: Jpt, ket_qn: Jpt,
                        a: usize, b: usize, c: usize, d: usize)
                        -> Result<f64, Error> {
        let bra = self.reify_jpt(bra_qn, a, b)?;
        let ket = self.reify_jpt(ket_qn, c, d)?;
        self.at(&bra, &ket)
    }

    pub fn get_tbme_jpt_norm(&self, bra_qn: Jpt, ket_qn: Jpt,
                             a: usize, b: usize, c: usize, d: usize)
                             -> Result<f64, Error> {
        let bra = self.reify_jpt(bra_qn, a, b)?;
        let ket = self.reify_jpt(ket_qn, c, d)?;
        Ok(self.at(&bra, &ket)? * bra.norm * ket.norm)
    }

    pub fn set_tbme_jpt(&mut self, bra_qn: Jpt, ket_qn: Jpt,
                        a: usize, b: usize, c: usize, d: usize, value: f64)
                        -> Result<(), Error> {
        let bra = self.reify_jpt(bra_qn, a, b)?;
        let ket = self.reify_jpt(ket_qn, c, d)?;
        self.put(&bra, &ket, value, Put::Set, true)
    }

    pub fn add_to_tbme_jpt(&mut self, bra_qn: Jpt, ket_qn: Jpt,
                           a: usize, b: usize, c: usize, d: usize, value: f64)
                           -> Result<(), Error> {
        let bra = self.reify_jpt(bra_qn, a, b)?;
        let ket = self.reify_jpt(ket_qn, c, d)?;
        self.put(&bra, &ket, value, Put::Add, true)
    }

    pub fn get_tbme_jpt_ket(&self, bra_qn: Jpt, ket_qn: Jpt,
                            bra: &Ket, ket: &Ket) -> Result<f64, Error> {
        self.get_tbme_jpt(bra_qn, ket_qn, bra.p, bra.q, ket.p, ket.q)
    }

    pub fn set_tbme_jpt_ket(&mut self, bra_qn: Jpt, ket_qn: Jpt,
                            bra: &Ket, ket: &Ket, value: f64)
                            -> Result<(), Error> {
        self.set_tbme_jpt(bra_qn, ket_qn, bra.p, bra.q, ket.p, ket.q, value)
    }

    pub fn add_to_tbme_jpt_ket(&mut self, bra_qn: Jpt, ket_qn: Jpt,
                               bra: &Ket, ket: &Ket, value: f64)
                               -> Result<(), Error> {
        self.add_to_tbme_jpt(bra_qn, ket_qn, bra.p, bra.q, ket.p, ket.q,
                             value)
    }

    ////////////////////////////////////////////////////////////////////////
    // J + orbits (parity and Tz follow from the orbits)

    /// Zero if either pair cannot couple to its `J` (triangle rule or Pauli
    /// principle).
    pub fn get_tbme_j(&self, j_bra: i32, j_ket: i32,
                      a: usize, b: usize, c: usize, d: usize)
                      -> Result<f64, Error> {
        match (self.reify_j(j_bra, a, b)?, self.reify_j(j_ket, c, d)?) {
            (Some(bra), Some(ket)) => self.at(&bra, &ket),
            _ => Ok(0.0),
        }
    }

    pub fn get_tbme_j_norm(&self, j_bra: i32, j_ket: i32,
                           a: usize, b: usize, c: usize, d: usize)
                           -> Result<f64, Error> {
        match (self.reify_j(j_bra, a, b)?, self.reify_j(j_ket, c, d)?) {
            (Some(bra), Some(ket)) => {
                Ok(self.at(&bra, &ket)? * bra.norm * ket.norm)
            }
            _ => Ok(0.0),
        }
    }

    /// Writing zero to a state that does not exist is a no-op; any other
    /// value is an error.
    pub fn set_tbme_j(&mut self, j_bra: i32, j_ket: i32,
                      a: usize, b: usize, c: usize, d: usize, value: f64)
                      -> Result<(), Error> {
        self.put_j(j_bra, j_ket, a, b, c, d, value, Put::Set)
    }

    pub fn add_to_tbme_j(&mut self, j_bra: i32, j_ket: i32,
                         a: usize, b: usize, c: usize, d: usize, value: f64)
                         -> Result<(), Error> {
        self.put_j(j_bra, j_ket, a, b, c, d, value, Put::Add)
    }

    fn put_j(&mut self, j_bra: i32, j_ket: i32,
             a: usize, b: usize, c: usize, d: usize, value: f64, mode: Put)
             -> Result<(), Error> {
        if value == 0.0 {
            if let (Some(bra), Some(ket)) =
                (self.reify_j(j_bra, a, b)?, self.reify_j(j_ket, c, d)?)
            {
                self.put(&bra, &ket, value, mode, true)?;
            }
            return Ok(());
        }
        let bra = self.require_j(j_bra, a, b)?;
        let ket = self.require_j(j_ket, c, d)?;
        self.put(&bra, &ket, value, mode, true)
    }

    /// Physical elements of `self` and `other` at the same address.
    pub fn get_tbme_j_norm_two_ops(&self, other: &TwoBodyMe,
                                   j_bra: i32, j_ket: i32,
                                   a: usize, b: usize, c: usize, d: usize)
                                   -> Result<(f64, f64), Error> {
        if !ptr::eq(self.model_space, other.model_space) {
            return Err(Error::ShapeMismatch(
                "operators belong to different model spaces".into()));
        }
        match (self.reify_j(j_bra, a, b)?, self.reify_j(j_ket, c, d)?) {
            (Some(bra), Some(ket)) => {
                let norm = bra.norm * ket.norm;
                Ok((self.at(&bra, &ket)? * norm,
                    other.at(&bra, &ket)? * norm))
            }
            _ => Ok((0.0, 0.0)),
        }
    }

    ////////////////////////////////////////////////////////////////////////
    // Monopole

    /// Angular average
    ///
    /// ```text
    /// Σ[J] (2 J + 1) V_J(ab, cd) / ((2 ja + 1) (2 jb + 1))
    /// ```
    ///
    /// over the stored elements.  Zero if `ab` and `cd` differ in parity
    /// or `Tz`.
    pub fn get_tbme_monopole(&self, a: usize, b: usize, c: usize, d: usize)
                             -> Result<f64, Error> {
        self.monopole(a, b, c, d, false)
    }

    /// Same as `get_tbme_monopole` but averages physical elements.
    pub fn get_tbme_monopole_norm(&self, a: usize, b: usize,
                                  c: usize, d: usize) -> Result<f64, Error> {
        self.monopole(a, b, c, d, true)
    }

    pub fn get_tbme_monopole_ket(&self, bra: &Ket, ket: &Ket)
                                 -> Result<f64, Error> {
        self.monopole(bra.p, bra.q, ket.p, ket.q, false)
    }

    fn monopole(&self, a: usize, b: usize, c: usize, d: usize,
                normalized: bool) -> Result<f64, Error> {
        self.require_scalar("monopole")?;
        let (oa, ob) = (self.orbit(a)?, self.orbit(b)?);
        let (oc, od) = (self.orbit(c)?, self.orbit(d)?);
        if oa.parity() + ob.parity() != oc.parity() + od.parity()
            || oa.tz + ob.tz != oc.tz + od.tz
        {
            return Ok(0.0);
        }
        let mut sum = 0.0;
        for j12 in oa.j.tri_range(ob.j) {
            let j = j12.twice() / 2;
            let v = if normalized {
                self.get_tbme_j_norm(j, j, a, b, c, d)?
            } else {
                self.get_tbme_j(j, j, a, b, c, d)?
            };
            sum += jweight(j12, 2) * v;
        }
        Ok(sum / (jweight(oa.j, 2) * jweight(ob.j, 2)))
    }

    ////////////////////////////////////////////////////////////////////////
    // Isospin conversion

    /// Proton-neutron kets fed by the isospin-coupled pair `(a, b)`, with
    /// their coefficients.  `(a_p, b_n)` and `(b_n, a_p)` count once.
    fn iso_components(&self, j: i32, t: i32, tz: i32, a: usize, b: usize)
                      -> Result<Vec<(usize, usize, f64)>, Error> {
        if !(t == 0 || t == 1) || tz.abs() > t {
            return Err(Error::Selection(format!(
                "invalid isospin (T, Tz) = ({}, {})", t, tz)));
        }
        let (oa, ob) = (self.orbit(a)?, self.orbit(b)?);
        let same = oa.same_nlj(*ob);
        if same && (j + t) % 2 == 0 {
            return Err(Error::Selection(format!(
                "orbits ({}, {}) cannot couple to J = {}, T = {}",
                a, b, j, t)));
        }
        let ms = self.model_space;
        let mut comps: Vec<(usize, usize, f64)> = Vec::new();
        for &ta in &[Half(1), Half(-1)] {
            let tb = Half::from(tz) - ta;
            if tb != Half(1) && tb != Half(-1) {
                continue;
            }
            let mut coef = isospin_cg(ta, tb, t, tz);
            if coef == 0.0 {
                continue;
            }
            let (pa, pb) = match (ms.isospin_partner(a, ta),
                                  ms.isospin_partner(b, tb)) {
                (Some(pa), Some(pb)) => (pa, pb),
                _ => return Err(Error::Selection(format!(
                    "isospin pair ({}, {}) with Tz = {} needs orbits with \
                     tz = ({}, {}) missing from the model space",
                    a, b, tz, ta, tb))),
            };
            if comps.iter().any(|&(p, q, _)| (p, q) == (pb, pa)) {
                continue;
            }
            if same && ta != tb {
                coef *= std::f64::consts::SQRT_2;
            }
            comps.push((pa, pb, coef));
        }
        Ok(comps)
    }

    fn iso_pair(&self, a: usize, b: usize) -> Result<(Orbit, Orbit), Error> {
        let (_, oa, ob) = sort2(self.orbit(a)?.with_tz(Half(1)),
                                self.orbit(b)?.with_tz(Half(1)));
        Ok((oa, ob))
    }

    /// Adds the contribution of the isospin-coupled element
    /// `⟨ab; J T Tz|V|cd; J T Tz⟩` to the proton-neutron elements it feeds.
    /// Calling this once for each `T` builds the full proton-neutron
    /// operator.  Requires a scalar operator.
    pub fn set_pn_tbme_from_iso(&mut self, j: i32, t: i32, tz: i32,
                                a: usize, b: usize, c: usize, d: usize,
                                value: f64) -> Result<(), Error> {
        self.require_scalar("isospin conversion")?;
        let bras = self.iso_components(j, t, tz, a, b)?;
        let kets = self.iso_components(j, t, tz, c, d)?;
        // pn elements of an off-diagonal isospin element must be mirrored
        // by hand; a diagonal one already covers both orderings
        let mirror = if self.iso_pair(a, b)? != self.iso_pair(c, d)? {
            self.symmetry.conj_sign()
        } else {
            None
        };
        for &(p, q, cb) in &bras {
            for &(r, s, ck) in &kets {
                let v = cb * ck * value;
                let bra = self.require_j(j, p, q)?;
                let ket = self.require_j(j, r, s)?;
                self.put(&bra, &ket, v, Put::Add, false)?;
                if let Some(sign) = mirror {
                    self.put(&ket, &bra, sign * v, Put::Add, false)?;
                }
            }
        }
        Ok(())
    }

    /// Isospin-coupled element `⟨ab; J T Tz|V|cd; J T Tz⟩` of a
    /// proton-neutron operator.  Requires a scalar operator.
    pub fn get_iso_tbme_from_pn(&self, j: i32, t: i32, tz: i32,
                                a: usize, b: usize, c: usize, d: usize)
                                -> Result<f64, Error> {
        self.require_scalar("isospin conversion")?;
        let bras = self.iso_components(j, t, tz, a, b)?;
        let kets = self.iso_components(j, t, tz, c, d)?;
        let mut sum = 0.0;
        for &(p, q, cb) in &bras {
            for &(r, s, ck) in &kets {
                sum += cb * ck * self.get_tbme_j(j, j, p, q, r, s)?;
            }
        }
        Ok(sum)
    }

    ////////////////////////////////////////////////////////////////////////
    // Whole-operator operations

    pub fn scale(&mut self, factor: f64) {
        for m in self.mat_el.values_mut() {
            *m *= factor;
        }
    }

    /// Zero every element, keeping the allocation.
    pub fn erase(&mut self) {
        for m in self.mat_el.values_mut() {
            m.fill(0.0);
        }
    }

    /// Replace each diagonal block `M` by `(M + Mᵗ) / 2`.
    pub fn symmetrize(&mut self) {
        self.symmetrize_with(1.0);
    }

    /// Replace each diagonal block `M` by `(M − Mᵗ) / 2`.
    pub fn anti_symmetrize(&mut self) {
        self.symmetrize_with(-1.0);
    }

    fn symmetrize_with(&mut self, s: f64) {
        for (&(ch_bra, ch_ket), m) in &mut self.mat_el {
            if ch_bra == ch_ket {
                m.symmetrize_with(s);
            }
        }
    }

    /// Identity on the diagonal blocks, zero elsewhere.
    pub fn eye(&mut self) {
        for (&(ch_bra, ch_ket), m) in &mut self.mat_el {
            if ch_bra == ch_ket {
                m.set_eye();
            } else {
                m.fill(0.0);
            }
        }
    }

    /// Frobenius norm.  Off-diagonal blocks of (anti-)Hermitian operators
    /// count twice since they also stand for their mirror block.
    pub fn norm(&self) -> f64 {
        let mirrored = self.symmetry.conj_sign().is_some();
        self.mat_el.iter().map(|(&(ch_bra, ch_ket), m)| {
            if mirrored && ch_bra != ch_ket {
                2.0 * m.norm_sqr()
            } else {
                m.norm_sqr()
            }
        }).sum::<f64>().sqrt()
    }

    /// Number of stored elements.
    pub fn dimension(&self) -> usize {
        self.mat_el.values().map(|m| m.len()).sum()
    }

    /// Size of the stored elements in bytes.
    pub fn size(&self) -> usize {
        self.dimension() * std::mem::size_of::<f64>()
    }

    /// Fill with uniformly distributed values in `[-1, 1)` that respect the
    /// declared symmetry.
    pub fn fill_random<R: Rng>(&mut self, rng: &mut R) {
        for m in self.mat_el.values_mut() {
            for x in m.as_mut_slice() {
                *x = rng.gen_range(-1.0 .. 1.0);
            }
        }
        if let Some(s) = self.symmetry.conj_sign() {
            self.symmetrize_with(s);
        }
    }

    ////////////////////////////////////////////////////////////////////////
    // Arithmetic

    fn check_compatible(&self, other: &TwoBodyMe) -> Result<(), Error> {
        if !ptr::eq(self.model_space, other.model_space) {
            return Err(Error::ShapeMismatch(
                "operators belong to different model spaces".into()));
        }
        if self.symmetry != other.symmetry {
            return Err(Error::ShapeMismatch(format!(
                "symmetry {:?} vs {:?}", self.symmetry, other.symmetry)));
        }
        let rank = (self.rank_j, self.rank_t, self.parity);
        let other_rank = (other.rank_j, other.rank_t, other.parity);
        if rank != other_rank {
            return Err(Error::ShapeMismatch(format!(
                "rank {:?} vs {:?}", rank, other_rank)));
        }
        if self.mat_el.len() != other.mat_el.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} blocks vs {} blocks",
                self.mat_el.len(), other.mat_el.len())));
        }
        for ((k1, m1), (k2, m2)) in self.mat_el.iter().zip(&other.mat_el) {
            if k1 != k2 || m1.dims() != m2.dims() {
                return Err(Error::ShapeMismatch(format!(
                    "block {:?} {:?} vs block {:?} {:?}",
                    k1, m1.dims(), k2, m2.dims())));
            }
        }
        Ok(())
    }

    pub fn try_add_assign(&mut self, other: &TwoBodyMe) -> Result<(), Error> {
        self.check_compatible(other)?;
        for (m, o) in self.mat_el.values_mut().zip(other.mat_el.values()) {
            *m += o;
        }
        Ok(())
    }

    pub fn try_sub_assign(&mut self, other: &TwoBodyMe) -> Result<(), Error> {
        self.check_compatible(other)?;
        for (m, o) in self.mat_el.values_mut().zip(other.mat_el.values()) {
            *m -= o;
        }
        Ok(())
    }

    pub fn try_add(&self, other: &TwoBodyMe) -> Result<Self, Error> {
        let mut result = self.clone();
        result.try_add_assign(other)?;
        Ok(result)
    }

    pub fn try_sub(&self, other: &TwoBodyMe) -> Result<Self, Error> {
        let mut result = self.clone();
        result.try_sub_assign(other)?;
        Ok(result)
    }

    ////////////////////////////////////////////////////////////////////////
    // Binary I/O

    /// Little-endian layout: block count (`u64`), then for each block in
    /// ascending `(ch_bra, ch_ket)` order its key and dimensions (four
    /// `u32`) followed by the stored elements in row-major order (`f64`).
    pub fn write_binary<W: io::Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u64::<LittleEndian>(cast(self.mat_el.len()))?;
        for (&(ch_bra, ch_ket), m) in &self.mat_el {
            w.write_u32::<LittleEndian>(cast(ch_bra))?;
            w.write_u32::<LittleEndian>(cast(ch_ket))?;
            w.write_u32::<LittleEndian>(cast(m.nrows()))?;
            w.write_u32::<LittleEndian>(cast(m.ncols()))?;
            for &x in m.as_slice() {
                w.write_f64::<LittleEndian>(x)?;
            }
        }
        Ok(())
    }

    /// Replace the contents with those written by `write_binary`.  The
    /// stream must match the blocks this operator would allocate; on
    /// failure the operator is left unchanged.
    pub fn read_binary<R: io::Read>(&mut self, r: &mut R) -> io::Result<()> {
        let layout = self.layout();
        let num_blocks = r.read_u64::<LittleEndian>()?;
        if num_blocks != layout.len() as u64 {
            return Err(invalid_data(format!(
                "expected {} blocks, found {}", layout.len(), num_blocks)));
        }
        let mut staged = BTreeMap::new();
        for (key, dims) in layout {
            let ch_bra = r.read_u32::<LittleEndian>()? as usize;
            let ch_ket = r.read_u32::<LittleEndian>()? as usize;
            let nrows = r.read_u32::<LittleEndian>()? as usize;
            let ncols = r.read_u32::<LittleEndian>()? as usize;
            if (ch_bra, ch_ket) != key {
                return Err(invalid_data(format!(
                    "expected block {:?}, found {:?}",
                    key, (ch_bra, ch_ket))));
            }
            if (nrows, ncols) != dims {
                return Err(invalid_data(format!(
                    "block {:?} should be {:?}, found {:?}",
                    key, dims, (nrows, ncols))));
            }
            let mut data = vec![0.0; nrows * ncols];
            r.read_f64_into::<LittleEndian>(&mut data)?;
            let m = Matrix::from_vec(data, nrows, ncols)
                .ok_or_else(|| invalid_data("inconsistent block size"))?;
            staged.insert(key, m);
        }
        self.mat_el = staged;
        self.num_chans = self.model_space.num_channels();
        self.allocated = true;
        Ok(())
    }
}

/// Prints every stored block.
impl<'a> fmt::Display for TwoBodyMe<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "# rank_j: {}, rank_t: {}, parity: {}, symmetry: {:?}",
                 self.rank_j, self.rank_t, self.parity, self.symmetry)?;
        let chans = self.model_space.channels();
        for (&(ch_bra, ch_ket), m) in &self.mat_el {
            writeln!(f, "# block ({}, {}): [{}] x [{}]",
                     ch_bra, ch_ket, chans[ch_bra].jpt, chans[ch_ket].jpt)?;
            fmt::Display::fmt(m, f)?;
        }
        Ok(())
    }
}

impl<'a, 'b> ops::AddAssign<&'b TwoBodyMe<'a>> for TwoBodyMe<'a> {
    /// # Panics
    ///
    /// Panics if the operators are not compatible (see `try_add_assign`).
    fn add_assign(&mut self, other: &'b TwoBodyMe<'a>) {
        self.try_add_assign(other).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl<'a, 'b> ops::SubAssign<&'b TwoBodyMe<'a>> for TwoBodyMe<'a> {
    /// # Panics
    ///
    /// Panics if the operators are not compatible (see `try_sub_assign`).
    fn sub_assign(&mut self, other: &'b TwoBodyMe<'a>) {
        self.try_sub_assign(other).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl<'a, 'b> ops::Add for &'b TwoBodyMe<'a> {
    type Output = TwoBodyMe<'a>;
    fn add(self, other: Self) -> Self::Output {
        let mut result = self.clone();
        result += other;
        result
    }
}

impl<'a, 'b> ops::Sub for &'b TwoBodyMe<'a> {
    type Output = TwoBodyMe<'a>;
    fn sub(self, other: Self) -> Self::Output {
        let mut result = self.clone();
        result -= other;
        result
    }
}

impl<'a> ops::MulAssign<f64> for TwoBodyMe<'a> {
    fn mul_assign(&mut self, factor: f64) {
        self.scale(factor);
    }
}

impl<'a> ops::Mul<f64> for TwoBodyMe<'a> {
    type Output = Self;
    fn mul(mut self, factor: f64) -> Self::Output {
        self.scale(factor);
        self
    }
}

impl<'a, 'b> ops::Mul<f64> for &'b TwoBodyMe<'a> {
    type Output = TwoBodyMe<'a>;
    fn mul(self, factor: f64) -> Self::Output {
        self.clone() * factor
    }
}

impl<'a, 'b> ops::Mul<&'b TwoBodyMe<'a>> for f64 {
    type Output = TwoBodyMe<'a>;
    fn mul(self, op: &'b TwoBodyMe<'a>) -> Self::Output {
        op * self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p12_space() -> ModelSpace {
        ModelSpace::new(vec![
            Orbit::proton(0, 1, Half(1)),
            Orbit::neutron(0, 1, Half(1)),
        ]).unwrap()
    }

    #[test]
    fn test_allocate() {
        let ms = p12_space();
        let op = TwoBodyMe::new(&ms);
        assert!(op.is_allocated());
        assert_eq!(op.blocks().count(), ms.num_channels());
        assert!(op.blocks().all(|(&(b, k), _)| b == k));

        // J = 0 ↔ J = 1 within the pn sector
        let op = TwoBodyMe::new_tensor(&ms, 1, 0, Parity::Even);
        let keys: Vec<_> = op.blocks().map(|(&k, _)| k).collect();
        for &(b, k) in &keys {
            assert!(b <= k);
            let (jb, jk) = (ms.channels()[b].jpt, ms.channels()[k].jpt);
            assert!(op.connects(jb, jk));
            assert_eq!(jb.tz, jk.tz);
        }
        assert!(keys.iter().any(|&(b, k)| b != k));

        let mut op = TwoBodyMe::new(&ms);
        op.deallocate();
        assert!(!op.is_allocated());
        assert_eq!(op.get_tbme_idx(0, 0, 0, 0), Err(Error::Lookup(0, 0)));
    }

    #[test]
    fn test_diagonal_ket_norm() {
        let ms = p12_space();
        let pp = ms.channel_index(Jpt { j: 0, p: Parity::Even, tz: 1 })
            .unwrap();
        let mut op = TwoBodyMe::new(&ms);
        op.set_tbme(pp, pp, 0, 0, 0, 0, 1.5).unwrap();
        assert_eq!(op.get_tbme(pp, pp, 0, 0, 0, 0).unwrap(), 1.5);
        assert!((op.get_tbme_norm(pp, pp, 0, 0, 0, 0).unwrap() - 3.0).abs()
                < 1e-12);
        op.set_tbme_norm(pp, pp, 0, 0, 0, 0, 1.0).unwrap();
        assert!((op.get_tbme(pp, pp, 0, 0, 0, 0).unwrap() - 0.5).abs()
                < 1e-12);
    }

    #[test]
    fn test_pauli_forbidden() {
        let ms = p12_space();
        let mut op = TwoBodyMe::new(&ms);
        // (0p1/2 p)² cannot couple to J = 1
        assert_eq!(op.get_tbme_j(1, 1, 0, 0, 0, 0), Ok(0.0));
        match op.set_tbme_j(1, 1, 0, 0, 0, 0, 1.0) {
            Err(Error::Selection(_)) => {}
            r => panic!("unexpected: {:?}", r),
        }
        assert_eq!(op.set_tbme_j(1, 1, 0, 0, 0, 0, 0.0), Ok(()));
    }

    #[test]
    fn test_symmetry_flags() {
        let ms = p12_space();
        let mut op = TwoBodyMe::new(&ms);
        assert!(op.is_hermitian());
        op.set_anti_hermitian();
        assert!(op.is_anti_hermitian() && !op.is_hermitian());
        op.set_non_hermitian();
        assert!(op.is_non_hermitian());
        assert_eq!(op.symmetry().conj_sign(), None);
    }
}
