use std::io;

use maxent::train::{Algorithm, Trainer};

#[test]
fn test_threads_validation() {
    let mut trainer = Trainer::gis();

    let result = trainer.set("Threads", "0");
    assert!(result.is_err());
    assert_eq!(result.unwrap_err().to_string(), "threads must be at least 1");

    assert!(trainer.set("Threads", "1").is_ok());
    assert!(trainer.set("Threads", "8").is_ok());
    assert_eq!(trainer.params().threads(), 8);

    let err = Trainer::gis().with_threads(0).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
}

#[test]
fn test_smoothing_flags_are_exclusive() {
    let mut trainer = Trainer::gis();
    trainer.set("Smoothing", "true").unwrap();

    let err = trainer.set("GaussianSmoothing", "true").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    assert_eq!(
        err.to_string(),
        "cannot enable both simple and gaussian smoothing"
    );
    assert!(!trainer.params().gaussian_smoothing());

    trainer.set("Smoothing", "false").unwrap();
    trainer.set("GaussianSmoothing", "TRUE").unwrap();
    assert!(trainer.params().gaussian_smoothing());
    assert!(trainer.set("Smoothing", "true").is_err());
}

#[test]
fn test_smoothing_values_validation() {
    let mut trainer = Trainer::gis();
    assert!(trainer.set("SmoothingObservation", "0").is_err());
    assert!(trainer.set("SmoothingObservation", "0.5").is_ok());
    assert!(trainer.set("GaussianSmoothingSigma", "-2").is_err());
    assert!(trainer.set("GaussianSmoothingSigma", "1.5").is_ok());
    assert_eq!(trainer.params().smoothing_observation(), 0.5);
    assert_eq!(trainer.params().sigma(), 1.5);
}

#[test]
fn test_iterations_validation() {
    let mut trainer = Trainer::perceptron();
    assert!(trainer.set("Iterations", "0").is_err());
    assert!(trainer.set("Iterations", "ten").is_err());
    assert!(trainer.set("Iterations", "10").is_ok());
    assert_eq!(trainer.params().max_iterations(), 10);
}

#[test]
fn test_tolerance_validation() {
    let mut trainer = Trainer::perceptron();

    let result = trainer.set("Tolerance", "-0.5");
    assert!(result.is_err());
    assert_eq!(result.unwrap_err().to_string(), "tolerance must be non-negative");

    assert!(trainer.set("Tolerance", "0.0").is_ok());
    assert!(trainer.set("Tolerance", "0.01").is_ok());
}

#[test]
fn test_step_size_decrease_validation() {
    let mut trainer = Trainer::perceptron();
    assert!(trainer.set("StepSizeDecrease", "-1").is_err());
    assert!(trainer.set("StepSizeDecrease", "150").is_err());
    assert!(trainer.set("StepSizeDecrease", "0.1").is_ok());
    assert_eq!(trainer.params().step_size_decrease(), Some(0.1));
}

#[test]
fn test_unknown_parameters() {
    let err = Trainer::gis().set("Tolerance", "0.1").unwrap_err();
    assert_eq!(err.to_string(), "unknown parameter: Tolerance");
    assert!(Trainer::perceptron().set("Threads", "2").is_err());
    assert!(Trainer::naive_bayes().set("Iterations", "2").is_err());

    // Shared keys work for every algorithm
    let mut trainer = Trainer::naive_bayes();
    trainer.set("Cutoff", "5").unwrap();
    assert_eq!(trainer.cutoff(), 5);
    trainer.set("Algorithm", "NAIVEBAYES").unwrap();
}

#[test]
fn test_algorithm_name_validation() {
    let err = Trainer::perceptron().set("Algorithm", "MAXENT").unwrap_err();
    assert_eq!(err.to_string(), "algorithm name must be PERCEPTRON");

    assert!(Algorithm::from_name("MAXENT").is_ok());
    let err = Algorithm::from_name("maxent").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

    let mut algorithm = Algorithm::from_name("MAXENT").unwrap();
    algorithm.set("Threads", "4").unwrap();
    algorithm.set("LLThreshold", "0.001").unwrap();
    assert!(algorithm.set("UseAverage", "true").is_err());
    match algorithm {
        Algorithm::Maxent(params) => {
            assert_eq!(params.threads(), 4);
            assert_eq!(params.ll_threshold(), 0.001);
        }
        other => panic!("unexpected algorithm {:?}", other),
    }
}

#[test]
fn test_cutoff_is_not_an_algorithm_parameter() {
    let mut algorithm = Algorithm::from_name("PERCEPTRON").unwrap();
    let err = algorithm.set("Cutoff", "2").unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    assert!(err.to_string().contains("train_events"));

    // The same key is accepted where indexing happens
    let mut trainer = Trainer::perceptron();
    trainer.set("Cutoff", "2").unwrap();
    assert_eq!(trainer.cutoff(), 2);
}
