use std::sync::Arc;

use pup_kernel::{DispatchConfig, Dispatcher, Formula, Operation};
use pup_layout::{BasicType, Datatype};
use pup_traits::ReduceOp;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Build a random non-overlapping layout with non-negative offsets.
fn random_layout(rng: &mut StdRng, basic: BasicType, depth: usize) -> Arc<Datatype> {
    let size = basic.size() as isize;
    let mut dt = Datatype::basic(basic);
    for _ in 0..depth {
        let ext = dt.extent() as isize;
        dt = match rng.gen_range(0..5) {
            0 => Datatype::contiguous(rng.gen_range(1..4), &dt).unwrap(),
            1 => {
                let bl = rng.gen_range(1..10);
                let stride = ext * bl as isize + rng.gen_range(0..3);
                Datatype::hvector(rng.gen_range(1..4), bl, stride * size, &dt).unwrap()
            }
            2 => {
                let count = rng.gen_range(1..4);
                let bl = rng.gen_range(1..4);
                let mut displs: Vec<isize> = (0..count)
                    .map(|j| j as isize * (ext * bl as isize + 2) * size)
                    .collect();
                if rng.gen_bool(0.5) {
                    displs.reverse();
                }
                Datatype::hindexed_block(count, bl, &displs, &dt).unwrap()
            }
            3 => {
                let count = rng.gen_range(1..4);
                let bls: Vec<usize> = (0..count).map(|_| rng.gen_range(0..4)).collect();
                let mut cursor = 0isize;
                let displs: Vec<isize> = bls
                    .iter()
                    .map(|&bl| {
                        let d = cursor;
                        cursor += ext * bl as isize + rng.gen_range(0..2);
                        d * size
                    })
                    .collect();
                Datatype::hindexed(count, &bls, &displs, &dt).unwrap()
            }
            _ => {
                let extent = dt.true_ub().max(0) as usize + rng.gen_range(0..3);
                Datatype::resized(0, extent * basic.size(), &dt).unwrap()
            }
        };
    }
    dt
}

fn run(dispatcher: &Dispatcher, op: Operation, src: &[u8], dst: &mut [u8], count: usize, dt: &Datatype) {
    dispatcher
        .select(dt, op)
        .unwrap()
        .invoke(src, dst, count, dt)
        .unwrap();
}

#[test]
fn test_random_layouts_match_formula() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let specialized = Dispatcher::default();
    let generic = Dispatcher::new(DispatchConfig::default().with_max_depth(0));

    for trial in 0..200 {
        let depth = rng.gen_range(0..5);
        let dt = random_layout(&mut rng, BasicType::Int64, depth);
        let count = rng.gen_range(1..4);
        let len = dt.described_len(count).unwrap();
        let src: Vec<i64> = (0..len as i64).map(|v| v * 31 + 7).collect();

        let mut expected = Vec::new();
        Formula::build(&dt).for_each_offset(count, |o| expected.push(src[o as usize]));
        assert_eq!(expected.len(), dt.packed_len(count).unwrap());

        for dispatcher in [&specialized, &generic] {
            let mut packed = vec![0i64; expected.len()];
            run(
                dispatcher,
                Operation::Pack,
                bytemuck::cast_slice(&src),
                bytemuck::cast_slice_mut(&mut packed),
                count,
                &dt,
            );
            assert_eq!(packed, expected, "trial {trial}: {dt}");

            let mut back = vec![0i64; len];
            run(
                dispatcher,
                Operation::Unpack,
                bytemuck::cast_slice(&packed),
                bytemuck::cast_slice_mut(&mut back),
                count,
                &dt,
            );
            Formula::build(&dt).for_each_offset(count, |o| {
                assert_eq!(back[o as usize], src[o as usize], "trial {trial}: {dt}");
            });
        }
    }
}

#[test]
fn test_random_accumulate_float() {
    let mut rng = StdRng::seed_from_u64(42);
    let dispatcher = Dispatcher::default();
    let sum = Operation::AccumulateUnpack(ReduceOp::Sum);

    for _ in 0..50 {
        let depth = rng.gen_range(1..4);
        let dt = random_layout(&mut rng, BasicType::Float, depth);
        let len = dt.described_len(2).unwrap();
        let n = dt.packed_len(2).unwrap();
        let a: Vec<f32> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let b: Vec<f32> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let mut dst = vec![0.0f32; len];
        run(&dispatcher, sum, bytemuck::cast_slice(&a), bytemuck::cast_slice_mut(&mut dst), 2, &dt);
        run(&dispatcher, sum, bytemuck::cast_slice(&b), bytemuck::cast_slice_mut(&mut dst), 2, &dt);

        let mut idx = 0;
        Formula::build(&dt).for_each_offset(2, |o| {
            approx::assert_relative_eq!(dst[o as usize], a[idx] + b[idx], epsilon = 1e-6);
            idx += 1;
        });
    }
}

#[test]
fn test_unaligned_buffers_fall_back() {
    let int = Datatype::basic(BasicType::Int32);
    let dt = Datatype::vector(3, 2, 5, &int).unwrap();
    let words: Vec<i32> = (0..30).collect();
    let mut shifted = vec![0u8; 1 + 120];
    shifted[1..].copy_from_slice(bytemuck::cast_slice(&words));

    let mut packed = [0i32; 6];
    run(
        &Dispatcher::default(),
        Operation::Pack,
        &shifted[1..],
        bytemuck::cast_slice_mut(&mut packed),
        1,
        &dt,
    );
    assert_eq!(packed, [0, 1, 5, 6, 10, 11]);
}
