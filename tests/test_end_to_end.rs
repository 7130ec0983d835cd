use maxent::train::{Algorithm, ModelWriter, Trainer};
use maxent::{Event, MaxentModel, ModelType};

fn weather_events() -> Vec<Event> {
    vec![
        Event::new("sunny", ["walk", "shop"]),
        Event::new("sunny", ["walk"]),
        Event::new("sunny", ["walk", "clean"]),
        Event::new("rainy", ["shop", "clean"]),
        Event::new("rainy", ["clean", "tv"]),
        Event::new("rainy", ["clean", "shop", "tv"]),
        Event::new("sunny", ["walk", "shop"]),
        Event::new("rainy", ["tv"]),
    ]
}

fn save_and_load(model: &MaxentModel) -> MaxentModel {
    let temp_file = tempfile::NamedTempFile::new().unwrap();
    ModelWriter::write(temp_file.path(), model).unwrap();
    assert!(temp_file.path().exists());

    let model_data = std::fs::read(temp_file.path()).unwrap();
    MaxentModel::from_bytes(&model_data).unwrap()
}

#[test]
fn test_train_save_load_predict() {
    for (name, model_type) in [
        ("MAXENT", ModelType::Maxent),
        ("PERCEPTRON", ModelType::Perceptron),
        ("NAIVEBAYES", ModelType::NaiveBayes),
    ] {
        let algorithm = Algorithm::from_name(name).unwrap();
        let result = algorithm.train_events(&weather_events(), 0).unwrap();
        let model = result.model;
        assert_eq!(model.model_type(), model_type);

        let loaded = save_and_load(&model);
        assert_eq!(loaded, model);
        assert_eq!(loaded.model_type(), model_type);
        assert_eq!(loaded.num_outcomes(), 2);
        assert_eq!(loaded.num_preds(), 4);
        assert_eq!(loaded.index("sunny"), model.index("sunny"));
        assert!(loaded.pred_index("walk").is_some());
        assert!(loaded.pred_index("rain").is_none());

        for context in [&["walk", "shop"][..], &["tv", "clean"][..], &["unseen"][..]] {
            let expected = model.eval(context);
            let actual = loaded.eval(context);
            assert_eq!(expected, actual, "{} on {:?}", name, context);
            assert!((actual.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }

        let dist = loaded.eval(&["walk"]);
        assert_eq!(loaded.best_outcome(&dist), "sunny", "{}", name);
        let dist = loaded.eval(&["tv", "clean"]);
        assert_eq!(loaded.best_outcome(&dist), "rainy", "{}", name);
    }
}

#[test]
fn test_trainer_with_cutoff() {
    let mut trainer = Trainer::gis().with_cutoff(4);
    trainer.append_all(weather_events()).unwrap();
    assert_eq!(trainer.num_events(), 8);
    let result = trainer.train().unwrap();

    // tv occurs only three times, leaving the last event without context
    let model = &result.model;
    assert_eq!(model.pred_labels(), &["clean", "shop", "walk"]);
    assert!(model.pred_index("tv").is_none());
    assert_eq!(result.stats.manifest()["Cutoff"], "4");
}

#[test]
fn test_cutoff_removing_everything() {
    let mut trainer = Trainer::perceptron().with_cutoff(100);
    trainer.append_all(weather_events()).unwrap();
    let err = trainer.train().unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
}

#[test]
fn test_model_dump() {
    let mut trainer = Trainer::naive_bayes();
    trainer.append_all(weather_events()).unwrap();
    let model = trainer.train().unwrap().model;

    let mut out = Vec::new();
    model.dump(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("type: NAIVEBAYES"));
    assert!(text.contains("walk --> sunny: 4.000000"));

    let dist = model.eval(&["walk"]);
    let rendered = model.all_outcomes(&dist);
    assert!(rendered.starts_with("sunny["));
    assert!(rendered.contains(" rainy["));
}

#[test]
fn test_corrupted_counts_are_rejected() {
    let model = Trainer::<maxent::train::Gis>::train_events(&weather_events(), 10, 0)
        .unwrap()
        .model;
    let temp_file = tempfile::NamedTempFile::new().unwrap();
    ModelWriter::write(temp_file.path(), &model).unwrap();
    let mut data = std::fs::read(temp_file.path()).unwrap();

    // Predicate count in the header and in the PARM chunk
    data[16..20].copy_from_slice(&u32::MAX.to_le_bytes());
    data[48..52].copy_from_slice(&u32::MAX.to_le_bytes());
    let err = MaxentModel::from_bytes(&data).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
}
