//! Cross-strategy equivalence: every strategy, at every unit count, must
//! produce the sequential result bit for bit.

use crest_compute::{Collective, Pipeline, Sequential, TaskFarm, WavefrontExecutor};
use crest_core::Matrix;

fn run(executor: &dyn WavefrontExecutor, n: usize) -> Matrix {
    let mut matrix = Matrix::new(n).unwrap();
    executor.execute(&mut matrix).unwrap();
    matrix
}

fn rendered(matrix: &Matrix) -> String {
    let mut out = Vec::new();
    matrix.write_result(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

fn parallel_lineup() -> Vec<(String, Box<dyn WavefrontExecutor>)> {
    let mut lineup: Vec<(String, Box<dyn WavefrontExecutor>)> = Vec::new();
    for workers in [1, 3, 8] {
        lineup.push((
            format!("farm/{workers}"),
            Box::new(TaskFarm::new(workers).unwrap()),
        ));
    }
    for ranks in [2, 4, 9] {
        lineup.push((
            format!("pipeline/{ranks}"),
            Box::new(Pipeline::new(ranks).unwrap()),
        ));
        lineup.push((
            format!("collective/{ranks}"),
            Box::new(Collective::new(ranks).unwrap()),
        ));
    }
    lineup
}

#[test]
fn test_all_strategies_agree_bit_for_bit() {
    let n = 24;
    let reference = run(&Sequential, n);
    let reference_text = rendered(&reference);

    for (label, executor) in parallel_lineup() {
        let matrix = run(executor.as_ref(), n);
        assert_eq!(matrix, reference, "{label}: cells diverged");
        assert_eq!(rendered(&matrix), reference_text, "{label}: result text diverged");
    }
}

#[test]
fn test_four_by_four_scenario() {
    let expected_12 = (0.5f64 * 0.75).cbrt();
    let expected_23 = (0.75f64 * 1.0).cbrt();

    for (label, executor) in parallel_lineup() {
        let matrix = run(executor.as_ref(), 4);

        // seeds (i + 1) / 4 must survive the sweep
        assert_eq!(matrix.at(0, 0), 0.25, "{label}");
        assert_eq!(matrix.at(1, 1), 0.5, "{label}");
        assert_eq!(matrix.at(2, 2), 0.75, "{label}");
        assert_eq!(matrix.at(3, 3), 1.0, "{label}");

        // first generation, hand-computed
        assert_eq!(matrix.at(0, 1), 0.5, "{label}: cbrt(0.25 * 0.5)");
        assert_eq!(matrix.at(1, 2), expected_12, "{label}");
        assert_eq!(matrix.at(2, 3), expected_23, "{label}");

        // second generation folds the first, row arm reversed
        let expected_02 = (matrix.at(0, 1) * matrix.at(2, 1) + matrix.at(0, 0) * matrix.at(2, 2)).cbrt();
        assert_eq!(matrix.at(0, 2), expected_02, "{label}");
    }
}

#[test]
fn test_sweep_preserves_symmetry_and_diagonal() {
    let n = 10;
    for (label, executor) in parallel_lineup() {
        let matrix = run(executor.as_ref(), n);
        for i in 0..n {
            let expected = (i + 1) as f64 / n as f64;
            assert_eq!(matrix.at(i, i), expected, "{label}: diagonal moved");
        }
        for row in 0..n {
            for col in 0..n {
                assert_eq!(
                    matrix.at(row, col),
                    matrix.at(col, row),
                    "{label}: asymmetry at ({row}, {col})"
                );
            }
        }
    }
}

#[test]
fn test_single_cell_boundary() {
    for (label, executor) in parallel_lineup() {
        let matrix = run(executor.as_ref(), 1);
        assert_eq!(matrix.at(0, 0), 1.0, "{label}");
        assert_eq!(matrix.top_right(), 1.0, "{label}");
    }
}

#[test]
fn test_two_cell_boundary() {
    let expected = (0.5f64 * 1.0).cbrt();
    for (label, executor) in parallel_lineup() {
        let matrix = run(executor.as_ref(), 2);
        assert_eq!(matrix.at(0, 1), expected, "{label}");
        assert_eq!(matrix.at(1, 0), expected, "{label}");
    }
}

#[test]
fn test_repeated_runs_are_identical() {
    let pipeline = Pipeline::new(3).unwrap();
    let first = run(&pipeline, 9);
    let second = run(&pipeline, 9);
    assert_eq!(rendered(&first), rendered(&second));

    let farm = TaskFarm::new(4).unwrap();
    let first = run(&farm, 9);
    let second = run(&farm, 9);
    assert_eq!(rendered(&first), rendered(&second));
}
