extern crate rand;
extern crate rand_xorshift;
#[macro_use]
extern crate tbme;

use std::io;
use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use tbme::ang_mom::phase;
use tbme::basis::Orbit;
use tbme::half::Half;
use tbme::model_space::{Jpt, ModelSpace};
use tbme::parity::Parity;
use tbme::tbme::{Error, Symmetry, TwoBodyMe};
use tbme::utils::Toler;

const TOLER: Toler = Toler { relerr: 1e-12, abserr: 1e-12 };

const RNG_SEED: [u8; 16] = [
    0x54, 0x67, 0x3a, 0x19, 0x69, 0xd4, 0xa7, 0xa8,
    0x05, 0x0e, 0x83, 0x97, 0xbb, 0xa7, 0x3b, 0x11,
];

fn assert_ops_eq(a: &TwoBodyMe, b: &TwoBodyMe) {
    assert_eq!(a.blocks().count(), b.blocks().count());
    for ((ka, ma), (kb, mb)) in a.blocks().zip(b.blocks()) {
        assert_eq!(ka, kb);
        assert_eq!(ma.dims(), mb.dims());
        for (&x, &y) in ma.as_slice().iter().zip(mb.as_slice()) {
            toler_assert_eq!(TOLER, x, y);
        }
    }
}

fn random_op<'a>(ms: &'a ModelSpace, rank_j: i32, symmetry: Symmetry,
                 rng: &mut XorShiftRng) -> TwoBodyMe<'a> {
    let mut op = TwoBodyMe::new_tensor(ms, rank_j, 0, Parity::Even);
    op.set_symmetry(symmetry);
    op.fill_random(rng);
    op
}

/// pn channel with J = 1 and positive parity; has several kets in e_max = 1
fn pn_j1(ms: &ModelSpace) -> usize {
    ms.channel_index(Jpt { j: 1, p: Parity::Even, tz: 0 }).unwrap()
}

#[test]
fn test_set_get_all_addressing_modes() {
    let ms = ModelSpace::with_e_max(1);
    let mut op = TwoBodyMe::new(&ms);
    for (ch, chan) in ms.channels().iter().enumerate() {
        let qn = chan.jpt;
        for (i, bra) in chan.kets().iter().enumerate() {
            for (k, ket) in chan.kets().iter().enumerate() {
                let v = 0.1 * (ch + 1) as f64 + 0.01 * i as f64
                    - 0.003 * k as f64;
                op.set_tbme(ch, ch, bra.p, bra.q, ket.p, ket.q, v).unwrap();
                let (a, b, c, d) = (bra.p, bra.q, ket.p, ket.q);
                toler_assert_eq!(TOLER, op.get_tbme(ch, ch, a, b, c, d)
                                 .unwrap(), v);
                toler_assert_eq!(TOLER, op.get_tbme_idx(ch, ch, i, k)
                                 .unwrap(), v);
                toler_assert_eq!(TOLER, op.get_tbme_ket(ch, ch, bra, ket)
                                 .unwrap(), v);
                toler_assert_eq!(TOLER, op.get_tbme_jpt(qn, qn, a, b, c, d)
                                 .unwrap(), v);
                toler_assert_eq!(TOLER, op.get_tbme_jpt_ket(qn, qn, bra, ket)
                                 .unwrap(), v);
                toler_assert_eq!(TOLER, op.get_tbme_j(qn.j, qn.j, a, b, c, d)
                                 .unwrap(), v);
                let v_norm = v * bra.norm() * ket.norm();
                toler_assert_eq!(TOLER, op.get_tbme_norm(ch, ch, a, b, c, d)
                                 .unwrap(), v_norm);
                toler_assert_eq!(TOLER, op.get_tbme_norm_idx(ch, ch, i, k)
                                 .unwrap(), v_norm);
                toler_assert_eq!(TOLER, op.get_tbme_ket_norm(ch, ch, bra, ket)
                                 .unwrap(), v_norm);
                toler_assert_eq!(TOLER, op.get_tbme_jpt_norm(qn, qn,
                                                             a, b, c, d)
                                 .unwrap(), v_norm);
                toler_assert_eq!(TOLER, op.get_tbme_j_norm(qn.j, qn.j,
                                                           a, b, c, d)
                                 .unwrap(), v_norm);
            }
        }
    }
}

#[test]
fn test_setters_agree() {
    let ms = ModelSpace::with_e_max(1);
    let ch = pn_j1(&ms);
    let chan = ms.channel(ch).unwrap();
    let (bra, ket) = (chan.kets()[0], chan.kets()[1]);
    let mut op = TwoBodyMe::new(&ms);

    op.set_tbme_idx(ch, ch, 0, 1, 1.0).unwrap();
    op.add_to_tbme_idx(ch, ch, 0, 1, 0.5).unwrap();
    toler_assert_eq!(TOLER, op.get_tbme_ket(ch, ch, &bra, &ket).unwrap(), 1.5);

    op.set_tbme_ket(ch, ch, &bra, &ket, 2.0).unwrap();
    op.add_to_tbme_ket(ch, ch, &bra, &ket, 0.25).unwrap();
    toler_assert_eq!(TOLER, op.get_tbme_idx(ch, ch, 0, 1).unwrap(), 2.25);

    op.set_tbme_jpt_ket(chan.jpt, chan.jpt, &bra, &ket, -1.0).unwrap();
    op.add_to_tbme_jpt(chan.jpt, chan.jpt,
                       bra.p, bra.q, ket.p, ket.q, 0.5).unwrap();
    op.add_to_tbme_jpt_ket(chan.jpt, chan.jpt, &bra, &ket, 0.25).unwrap();
    toler_assert_eq!(TOLER, op.get_tbme_idx(ch, ch, 0, 1).unwrap(), -0.25);

    op.set_tbme_jpt(chan.jpt, chan.jpt,
                    bra.p, bra.q, ket.p, ket.q, 3.0).unwrap();
    op.add_to_tbme_j(1, 1, bra.p, bra.q, ket.p, ket.q, 1.0).unwrap();
    toler_assert_eq!(TOLER, op.get_tbme_idx(ch, ch, 0, 1).unwrap(), 4.0);

    op.set_tbme_j(1, 1, bra.p, bra.q, ket.p, ket.q, 5.0).unwrap();
    toler_assert_eq!(TOLER, op.get_tbme_idx(ch, ch, 1, 0).unwrap(), 5.0);
}

#[test]
fn test_exchange_phase() {
    let ms = ModelSpace::with_e_max(1);
    let ch = pn_j1(&ms);
    let chan = ms.channel(ch).unwrap();
    // (0s1/2 p, 0s1/2 n) coupled to J = 1 picks up −(−1)^(1/2 + 1/2 − 1)
    let i = chan.local_index(0, 1).unwrap();
    let k = chan.local_index(2, 3).unwrap();
    assert_eq!(chan.kets()[i].phase(1), -1.0);

    let mut op = TwoBodyMe::new(&ms);
    op.set_tbme(ch, ch, 1, 0, 2, 3, 0.75).unwrap();
    toler_assert_eq!(TOLER, op.get_tbme_idx(ch, ch, i, k).unwrap(), -0.75);
    toler_assert_eq!(TOLER, op.get_tbme(ch, ch, 1, 0, 2, 3).unwrap(), 0.75);
    // (0p1/2 p, 0p1/2 n) at J = 1 has the same phase
    toler_assert_eq!(TOLER, op.get_tbme(ch, ch, 1, 0, 3, 2).unwrap(), -0.75);
    toler_assert_eq!(TOLER, op.get_tbme(ch, ch, 0, 1, 3, 2).unwrap(), 0.75);
    // Hermitian conjugate also follows the phase
    toler_assert_eq!(TOLER, op.get_tbme(ch, ch, 2, 3, 1, 0).unwrap(), 0.75);
}

#[test]
fn test_hermitian_propagation() {
    let ms = ModelSpace::with_e_max(1);
    let ch = pn_j1(&ms);
    for &(symmetry, s) in &[(Symmetry::Hermitian, 1.0),
                            (Symmetry::AntiHermitian, -1.0)] {
        let mut op = TwoBodyMe::new(&ms);
        op.set_symmetry(symmetry);
        op.set_tbme_idx(ch, ch, 0, 2, 0.5).unwrap();
        toler_assert_eq!(TOLER, op.get_tbme_idx(ch, ch, 2, 0).unwrap(),
                         s * 0.5);
        op.add_to_tbme_idx(ch, ch, 0, 2, 0.25).unwrap();
        toler_assert_eq!(TOLER, op.get_tbme_idx(ch, ch, 2, 0).unwrap(),
                         s * 0.75);

        // diagonal cells are written once
        op.add_to_tbme_idx(ch, ch, 1, 1, 0.125).unwrap();
        toler_assert_eq!(TOLER, op.get_tbme_idx(ch, ch, 1, 1).unwrap(),
                         0.125);

        // no propagation
        op.add_to_tbme_non_herm_idx(ch, ch, 0, 2, 1.0).unwrap();
        toler_assert_eq!(TOLER, op.get_tbme_idx(ch, ch, 0, 2).unwrap(), 1.75);
        toler_assert_eq!(TOLER, op.get_tbme_idx(ch, ch, 2, 0).unwrap(),
                         s * 0.75);
        let chan = ms.channel(ch).unwrap();
        let (bra, ket) = (chan.kets()[0], chan.kets()[2]);
        op.add_to_tbme_non_herm(ch, ch, ket.p, ket.q, bra.p, bra.q, 1.0)
            .unwrap();
        toler_assert_eq!(TOLER, op.get_tbme_idx(ch, ch, 2, 0).unwrap(),
                         s * 0.75 + 1.0);
        toler_assert_eq!(TOLER, op.get_tbme_idx(ch, ch, 0, 2).unwrap(), 1.75);
    }

    let mut op = TwoBodyMe::new(&ms);
    op.set_non_hermitian();
    op.set_tbme_idx(ch, ch, 0, 2, 0.5).unwrap();
    toler_assert_eq!(TOLER, op.get_tbme_idx(ch, ch, 2, 0).unwrap(), 0.0);
}

#[test]
fn test_add_accumulates() {
    let ms = ModelSpace::with_e_max(1);
    let mut rng = XorShiftRng::from_seed(RNG_SEED);
    let mut op = random_op(&ms, 0, Symmetry::Hermitian, &mut rng);
    for (ch, chan) in ms.channels().iter().enumerate() {
        for (i, bra) in chan.kets().iter().enumerate() {
            for (k, ket) in chan.kets().iter().enumerate() {
                let old = op.get_tbme_idx(ch, ch, i, k).unwrap();
                let old_conj = op.get_tbme_idx(ch, ch, k, i).unwrap();
                toler_assert_eq!(TOLER, old, old_conj);
                op.add_to_tbme(ch, ch, bra.p, bra.q, ket.p, ket.q, 0.5)
                    .unwrap();
                let new = op.get_tbme_idx(ch, ch, i, k).unwrap();
                toler_assert_eq!(TOLER, new, old + 0.5);
                toler_assert_eq!(TOLER,
                                 op.get_tbme_idx(ch, ch, k, i).unwrap(), new);
            }
        }
    }
}

#[test]
fn test_tensor_mirror() {
    let ms = ModelSpace::with_e_max(1);
    let mut rng = XorShiftRng::from_seed(RNG_SEED);
    for &(symmetry, s) in &[(Symmetry::Hermitian, 1.0),
                            (Symmetry::AntiHermitian, -1.0)] {
        let op = random_op(&ms, 1, symmetry, &mut rng);
        let mut num_off_diag = 0;
        for (&(ch_bra, ch_ket), m) in op.blocks() {
            if ch_bra == ch_ket {
                continue;
            }
            num_off_diag += 1;
            let (jb, jk) = (ms.channels()[ch_bra].j(),
                            ms.channels()[ch_ket].j());
            for i in 0 .. m.nrows() {
                for k in 0 .. m.ncols() {
                    toler_assert_eq!(
                        TOLER,
                        op.get_tbme_idx(ch_ket, ch_bra, k, i).unwrap(),
                        s * phase(jk - jb) * m[(i, k)]);
                }
            }
        }
        assert!(num_off_diag > 0);
    }

    let mut op = random_op(&ms, 1, Symmetry::General, &mut rng);
    let (&(ch_bra, ch_ket), _) = op.blocks()
        .find(|&(&(b, k), _)| b != k)
        .unwrap();
    assert_eq!(op.get_tbme_idx(ch_ket, ch_bra, 0, 0),
               Err(Error::Lookup(ch_ket, ch_bra)));
    assert_eq!(op.set_tbme_idx(ch_ket, ch_bra, 0, 0, 1.0),
               Err(Error::Lookup(ch_ket, ch_bra)));

    // writes through the mirrored address land in the stored block
    op.set_hermitian();
    op.set_tbme_idx(ch_ket, ch_bra, 0, 0, 1.0).unwrap();
    toler_assert_eq!(TOLER, op.get_tbme_idx(ch_ket, ch_bra, 0, 0).unwrap(),
                     1.0);
}

#[test]
fn test_symmetrize() {
    let ms = ModelSpace::with_e_max(1);
    let mut rng = XorShiftRng::from_seed(RNG_SEED);
    let mut op = random_op(&ms, 0, Symmetry::General, &mut rng);
    op.symmetrize();
    let once = op.clone();
    op.symmetrize();
    assert_ops_eq(&op, &once);
    for (_, m) in op.blocks() {
        assert_eq!(m, &m.transpose());
    }

    op.fill_random(&mut rng);
    op.anti_symmetrize();
    for (_, m) in op.blocks() {
        let mut t = m.transpose();
        t *= -1.0;
        assert_eq!(m, &t);
    }
}

#[test]
fn test_scale_and_arithmetic() {
    let ms = ModelSpace::with_e_max(1);
    let mut rng = XorShiftRng::from_seed(RNG_SEED);
    let a = random_op(&ms, 0, Symmetry::Hermitian, &mut rng);
    let b = random_op(&ms, 0, Symmetry::Hermitian, &mut rng);

    let mut scaled = a.clone();
    scaled.scale(2.5);
    for ((_, ma), (_, ms_)) in a.blocks().zip(scaled.blocks()) {
        for (&x, &y) in ma.as_slice().iter().zip(ms_.as_slice()) {
            toler_assert_eq!(TOLER, 2.5 * x, y);
        }
    }
    assert_ops_eq(&(&a * 2.5), &scaled);
    assert_ops_eq(&(2.5 * &a), &scaled);
    let mut c = a.clone();
    c *= 2.5;
    assert_ops_eq(&c, &scaled);
    toler_assert_eq!(TOLER, scaled.norm(), 2.5 * a.norm());

    let sum = &a + &b;
    assert_ops_eq(&(&sum - &b), &a);
    let mut d = a.clone();
    d += &b;
    d -= &a;
    assert_ops_eq(&d, &b);
    assert_ops_eq(&a.try_add(&b).unwrap().try_sub(&b).unwrap(), &a);

    let t = TwoBodyMe::new_tensor(&ms, 1, 0, Parity::Even);
    match a.try_add(&t) {
        Err(Error::ShapeMismatch(_)) => {}
        r => panic!("unexpected: {:?}", r.map(|_| ())),
    }
    let other_ms = ModelSpace::with_e_max(1);
    let e = TwoBodyMe::new(&other_ms);
    match a.try_sub(&e) {
        Err(Error::ShapeMismatch(_)) => {}
        r => panic!("unexpected: {:?}", r.map(|_| ())),
    }
}

#[test]
fn test_arithmetic_symmetry_mismatch() {
    let ms = ModelSpace::with_e_max(1);
    let mut rng = XorShiftRng::from_seed(RNG_SEED);
    let h = random_op(&ms, 1, Symmetry::Hermitian, &mut rng);
    let mut ah = random_op(&ms, 1, Symmetry::AntiHermitian, &mut rng);
    let before = ah.clone();
    match h.try_add(&ah) {
        Err(Error::ShapeMismatch(msg)) => assert!(msg.contains("symmetry")),
        r => panic!("unexpected: {:?}", r.map(|_| ())),
    }
    match ah.try_sub_assign(&h) {
        Err(Error::ShapeMismatch(_)) => {}
        r => panic!("unexpected: {:?}", r),
    }
    assert_ops_eq(&ah, &before);

    // different isospin rank
    let a = TwoBodyMe::new_tensor(&ms, 0, 0, Parity::Even);
    let b = TwoBodyMe::new_tensor(&ms, 0, 1, Parity::Even);
    match a.try_add(&b) {
        Err(Error::ShapeMismatch(msg)) => assert!(msg.contains("rank")),
        r => panic!("unexpected: {:?}", r.map(|_| ())),
    }

    ah.set_hermitian();
    assert!(h.try_add(&ah).is_ok());
}

#[test]
#[should_panic]
fn test_add_mismatched_panics() {
    let ms = ModelSpace::with_e_max(1);
    let a = TwoBodyMe::new(&ms);
    let b = TwoBodyMe::new_tensor(&ms, 2, 0, Parity::Even);
    let _ = &a + &b;
}

#[test]
fn test_whole_operator() {
    let ms = ModelSpace::with_e_max(1);
    let mut rng = XorShiftRng::from_seed(RNG_SEED);
    let mut op = random_op(&ms, 0, Symmetry::Hermitian, &mut rng);
    let dim: usize = ms.channels().iter()
        .map(|c| c.num_kets() * c.num_kets())
        .sum();
    assert_eq!(op.dimension(), dim);
    assert_eq!(op.size(), dim * 8);
    assert_eq!(op.num_channels(), ms.num_channels());

    op.eye();
    let n: usize = ms.channels().iter().map(|c| c.num_kets()).sum();
    toler_assert_eq!(TOLER, op.norm(), (n as f64).sqrt());
    toler_assert_eq!(TOLER, op.get_tbme_idx(0, 0, 0, 0).unwrap(), 1.0);

    op.erase();
    assert_eq!(op.norm(), 0.0);
    assert!(op.is_allocated());

    let printed = op.to_string();
    assert!(printed.contains("block (0, 0)"));
}

#[test]
fn test_binary_round_trip() {
    let ms = ModelSpace::with_e_max(1);
    let mut rng = XorShiftRng::from_seed(RNG_SEED);
    let op = random_op(&ms, 1, Symmetry::Hermitian, &mut rng);
    assert!(op.blocks().any(|(&(b, k), _)| b != k));
    let mut buf = Vec::new();
    op.write_binary(&mut buf).unwrap();

    let mut restored = TwoBodyMe::unallocated(&ms, 1, 0, Parity::Even);
    restored.read_binary(&mut &buf[..]).unwrap();
    assert!(restored.is_allocated());
    for ((ka, ma), (kb, mb)) in op.blocks().zip(restored.blocks()) {
        assert_eq!(ka, kb);
        assert_eq!(ma, mb);
    }

    // truncated stream
    let mut target = random_op(&ms, 1, Symmetry::Hermitian, &mut rng);
    let before = target.clone();
    assert!(target.read_binary(&mut &buf[.. buf.len() - 3]).is_err());
    assert_ops_eq(&target, &before);

    // wrong block structure
    let mut scalar = TwoBodyMe::new(&ms);
    let e = scalar.read_binary(&mut &buf[..]).unwrap_err();
    assert_eq!(e.kind(), io::ErrorKind::InvalidData);
    assert_eq!(scalar.norm(), 0.0);

    // right block count, but the first block header is corrupted: bytes
    // 8..16 hold its key and 16..24 its dimensions
    for &offset in &[8, 16] {
        let mut corrupt = buf.clone();
        corrupt[offset] += 1;
        let mut target = random_op(&ms, 1, Symmetry::Hermitian, &mut rng);
        let before = target.clone();
        let e = target.read_binary(&mut &corrupt[..]).unwrap_err();
        assert_eq!(e.kind(), io::ErrorKind::InvalidData);
        let msg = e.to_string();
        if offset == 8 {
            assert!(msg.contains("expected block"), "{}", msg);
        } else {
            assert!(msg.contains("should be"), "{}", msg);
        }
        assert_ops_eq(&target, &before);
    }
}

#[test]
fn test_reallocate() {
    let ms = ModelSpace::with_e_max(1);
    let mut rng = XorShiftRng::from_seed(RNG_SEED);
    let mut op = random_op(&ms, 1, Symmetry::Hermitian, &mut rng);
    assert!(op.norm() > 0.0);
    let keys: Vec<_> = op.blocks().map(|(&k, m)| (k, m.dims())).collect();

    op.allocate();
    assert!(op.is_allocated());
    assert_eq!(op.norm(), 0.0);
    let new_keys: Vec<_> = op.blocks().map(|(&k, m)| (k, m.dims())).collect();
    assert_eq!(new_keys, keys);

    op.allocate();
    assert_eq!(op.blocks().count(), keys.len());
}

#[test]
fn test_compressed_file_round_trip() {
    let ms = ModelSpace::with_e_max(1);
    let mut rng = XorShiftRng::from_seed(RNG_SEED);
    let op = random_op(&ms, 0, Symmetry::AntiHermitian, &mut rng);
    for ext in &["bin", "bin.gz", "bin.xz"] {
        let path = std::env::temp_dir().join(
            format!("tbme-test-{}.{}", std::process::id(), ext));
        {
            let mut w = tbme::io::create_compressed(&path).unwrap();
            op.write_binary(&mut w).unwrap();
        }
        let mut restored = TwoBodyMe::new(&ms);
        restored.read_binary(&mut tbme::io::open_compressed(&path).unwrap())
            .unwrap();
        assert_ops_eq(&restored, &op);
        std::fs::remove_file(&path).unwrap();
    }
}

#[test]
fn test_isospin_round_trip() {
    let ms = ModelSpace::with_e_max(1);
    let s = ms.find_orbit(&Orbit::proton(0, 0, Half(1))).unwrap();
    let p1 = ms.find_orbit(&Orbit::proton(0, 1, Half(1))).unwrap();
    let p3 = ms.find_orbit(&Orbit::proton(0, 1, Half(3))).unwrap();
    let p3n = ms.find_orbit(&Orbit::neutron(0, 1, Half(3))).unwrap();
    let mut op = TwoBodyMe::new(&ms);

    // diagonal in isospin orbits, distinct (n, l, j)
    op.set_pn_tbme_from_iso(1, 0, 0, s, p3, s, p3, 0.7).unwrap();
    op.set_pn_tbme_from_iso(1, 1, 0, s, p3, s, p3, -0.3).unwrap();
    toler_assert_eq!(TOLER, op.get_iso_tbme_from_pn(1, 0, 0, s, p3, s, p3)
                     .unwrap(), 0.7);
    toler_assert_eq!(TOLER, op.get_iso_tbme_from_pn(1, 1, 0, s, p3, s, p3)
                     .unwrap(), -0.3);
    // isospin orbits may be named by either nucleon
    toler_assert_eq!(TOLER, op.get_iso_tbme_from_pn(1, 1, 0, s, p3n, s, p3)
                     .unwrap(), -0.3);

    op.set_pn_tbme_from_iso(1, 1, 1, s, p3, s, p3, 0.5).unwrap();
    toler_assert_eq!(TOLER, op.get_tbme_j(1, 1, s, p3, s, p3).unwrap(), 0.5);
    toler_assert_eq!(TOLER, op.get_iso_tbme_from_pn(1, 1, 1, s, p3, s, p3)
                     .unwrap(), 0.5);

    // identical isospin orbits: J + T must be odd
    op.set_pn_tbme_from_iso(0, 1, 0, p1, p1, p1, p1, 0.4).unwrap();
    op.set_pn_tbme_from_iso(1, 0, 0, p1, p1, p1, p1, 0.9).unwrap();
    let p1n = ms.isospin_partner(p1, Half(-1)).unwrap();
    toler_assert_eq!(TOLER, op.get_tbme_j(0, 0, p1, p1n, p1, p1n).unwrap(),
                     0.4);
    toler_assert_eq!(TOLER, op.get_iso_tbme_from_pn(0, 1, 0, p1, p1, p1, p1)
                     .unwrap(), 0.4);
    toler_assert_eq!(TOLER, op.get_iso_tbme_from_pn(1, 0, 0, p1, p1, p1, p1)
                     .unwrap(), 0.9);
    match op.set_pn_tbme_from_iso(0, 0, 0, p1, p1, p1, p1, 1.0) {
        Err(Error::Selection(_)) => {}
        r => panic!("unexpected: {:?}", r),
    }

    // off-diagonal in isospin orbits is mirrored for Hermitian operators
    op.set_pn_tbme_from_iso(1, 0, 0, s, p1, s, p3, 0.2).unwrap();
    toler_assert_eq!(TOLER, op.get_iso_tbme_from_pn(1, 0, 0, s, p3, s, p1)
                     .unwrap(), 0.2);
    toler_assert_eq!(TOLER, op.get_iso_tbme_from_pn(1, 0, 0, s, p1, s, p3)
                     .unwrap(), 0.2);
    toler_assert_eq!(TOLER, op.get_iso_tbme_from_pn(1, 1, 0, s, p1, s, p3)
                     .unwrap(), 0.0);

    let t = TwoBodyMe::new_tensor(&ms, 1, 0, Parity::Even);
    assert!(t.get_iso_tbme_from_pn(1, 0, 0, s, p3, s, p3).is_err());
}

#[test]
fn test_isospin_missing_partner() {
    // protons only: the Tz = 0 components have nowhere to go
    let ms = ModelSpace::new(vec![
        Orbit::proton(0, 0, Half(1)),
        Orbit::proton(0, 1, Half(3)),
    ]).unwrap();
    let mut op = TwoBodyMe::new(&ms);
    for &t in &[0, 1] {
        match op.set_pn_tbme_from_iso(1, t, 0, 0, 1, 0, 1, 0.7) {
            Err(Error::Selection(_)) => {}
            r => panic!("unexpected: {:?}", r),
        }
        match op.get_iso_tbme_from_pn(1, t, 0, 0, 1, 0, 1) {
            Err(Error::Selection(_)) => {}
            r => panic!("unexpected: {:?}", r),
        }
    }
    assert_eq!(op.norm(), 0.0);

    // the pp component is still reachable
    op.set_pn_tbme_from_iso(1, 1, 1, 0, 1, 0, 1, 0.7).unwrap();
    toler_assert_eq!(TOLER, op.get_iso_tbme_from_pn(1, 1, 1, 0, 1, 0, 1)
                     .unwrap(), 0.7);
    toler_assert_eq!(TOLER, op.get_tbme_j(1, 1, 0, 1, 0, 1).unwrap(), 0.7);
    match op.set_pn_tbme_from_iso(1, 1, -1, 0, 1, 0, 1, 0.7) {
        Err(Error::Selection(_)) => {}
        r => panic!("unexpected: {:?}", r),
    }
}

#[test]
fn test_monopole() {
    // two channels in the pn sector: J = 0 and J = 1
    let ms = ModelSpace::new(vec![
        Orbit::proton(0, 1, Half(1)),
        Orbit::neutron(0, 1, Half(1)),
    ]).unwrap();
    let mut op = TwoBodyMe::new(&ms);
    op.set_tbme_j(0, 0, 0, 1, 0, 1, 2.0).unwrap();
    op.set_tbme_j(1, 1, 0, 1, 0, 1, 1.0).unwrap();
    toler_assert_eq!(TOLER, op.get_tbme_monopole(0, 1, 0, 1).unwrap(),
                     (1.0 * 2.0 + 3.0 * 1.0) / 4.0);
    toler_assert_eq!(TOLER, op.get_tbme_monopole_norm(0, 1, 0, 1).unwrap(),
                     (1.0 * 2.0 + 3.0 * 1.0) / 4.0);

    // identical orbits: only J = 0 survives
    op.set_tbme_j(0, 0, 0, 0, 0, 0, 1.0).unwrap();
    toler_assert_eq!(TOLER, op.get_tbme_monopole(0, 0, 0, 0).unwrap(), 0.25);
    toler_assert_eq!(TOLER, op.get_tbme_monopole_norm(0, 0, 0, 0).unwrap(),
                     0.5);
    let chan = ms.channel(0).unwrap();
    let ket = chan.kets()[0];
    toler_assert_eq!(TOLER, op.get_tbme_monopole_ket(&ket, &ket).unwrap(),
                     op.get_tbme_monopole(ket.p, ket.q, ket.p, ket.q)
                     .unwrap());

    // different Tz
    assert_eq!(op.get_tbme_monopole(0, 0, 0, 1), Ok(0.0));

    let t = TwoBodyMe::new_tensor(&ms, 1, 0, Parity::Even);
    match t.get_tbme_monopole(0, 1, 0, 1) {
        Err(Error::Selection(_)) => {}
        r => panic!("unexpected: {:?}", r),
    }
}

#[test]
fn test_errors() {
    let ms = ModelSpace::with_e_max(1);
    let mut op = TwoBodyMe::new(&ms);
    let ch = pn_j1(&ms);
    let other = ms.channel_index(Jpt { j: 0, p: Parity::Even, tz: 0 })
        .unwrap();
    let (lo, hi) = if ch < other { (ch, other) } else { (other, ch) };
    assert_eq!(op.get_tbme_idx(lo, hi, 0, 0), Err(Error::Lookup(lo, hi)));
    assert_eq!(op.get_matrix(lo, hi).map(|_| ()), Err(Error::Lookup(lo, hi)));

    // 0s1/2 p and 0p1/2 n have odd parity
    match op.get_tbme(ch, ch, 0, 3, 0, 1) {
        Err(Error::Selection(_)) => {}
        r => panic!("unexpected: {:?}", r),
    }
    match op.set_tbme_idx(ch, ch, 100, 0, 1.0) {
        Err(Error::Selection(_)) => {}
        r => panic!("unexpected: {:?}", r),
    }
    let missing = Jpt { j: 7, p: Parity::Even, tz: 0 };
    assert_eq!(op.get_tbme_jpt(missing, missing, 0, 1, 0, 1),
               Err(Error::NoChannel(missing)));

    let (x, y) = op.get_tbme_j_norm_two_ops(&op.clone(), 1, 1, 0, 1, 0, 1)
        .unwrap();
    assert_eq!((x, y), (0.0, 0.0));
}
