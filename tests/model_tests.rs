use anyhow::Result;
use ndarray::array;
use nmfcore::prelude::*;
use nmfcore::routines::update::frobenius_norm;

/// 4 documents, each a one-hot count vector on a distinct term
fn one_hot_corpus() -> Corpus {
    Corpus::from_documents(vec![
        vec![(0, 1.0)],
        vec![(1, 1.0)],
        vec![(2, 1.0)],
        vec![(3, 1.0)],
    ])
}

/// Two clearly separated term clusters: {0, 1} and {3, 4}
fn clustered_corpus() -> Corpus {
    Corpus::from_documents(vec![
        vec![(0, 3.0), (1, 2.0)],
        vec![(0, 2.0), (1, 3.0)],
        vec![(3, 3.0), (4, 2.0)],
        vec![(3, 2.0), (4, 3.0)],
    ])
}

fn scenario_settings(passes: usize) -> Settings {
    let mut settings = Settings::new();
    settings.model.num_topics = 2;
    settings.training.chunksize = 4;
    settings.training.passes = passes;
    settings.log.write = false;
    settings
}

/// Reconstruction error of the full corpus against the trained dictionary
fn reconstruction_error(model: &Nmf, corpus: &Corpus) -> Result<f64> {
    let batch = Batch::from_documents(corpus.documents(), model.n_features())?;
    let dictionary = model.dictionary().expect("model is trained");
    let solver = Solver {
        kappa: 1.0,
        lambda: 1.0,
        use_r: false,
        max_iter: 200,
        stop_condition: 1e-6,
    };
    let output = solver.solve(batch.matrix(), dictionary.matrix(), None, None, f64::INFINITY);
    let wh = dictionary.matrix().dot(&output.h);
    Ok(frobenius_norm(&(batch.matrix() - &wh)))
}

#[test]
fn test_scenario_a_topics_shape_and_descent() -> Result<()> {
    let corpus = one_hot_corpus();

    let mut short = Nmf::new(scenario_settings(1), 5)?;
    short.update(&corpus)?;

    let mut long = Nmf::new(scenario_settings(10), 5)?;
    long.update(&corpus)?;

    let topics = long.topics()?;
    assert_eq!(topics.dim(), (2, 5));
    assert!(topics.iter().all(|&x| x >= 0.0));
    for row in topics.rows() {
        assert!((row.sum() - 1.0).abs() < 1e-6);
    }

    let error_short = reconstruction_error(&short, &corpus)?;
    let error_long = reconstruction_error(&long, &corpus)?;
    assert!(
        error_long < error_short,
        "10 passes did not improve on 1 pass: {} >= {}",
        error_long,
        error_short
    );

    Ok(())
}

#[test]
fn test_scenario_b_empty_corpus() -> Result<()> {
    let mut model = Nmf::new(scenario_settings(1), 5)?;
    let result = model.update(&Corpus::new());

    let error = result.unwrap_err();
    assert_eq!(error.downcast::<NmfError>()?, NmfError::EmptyCorpus);

    // Raised before any matrix allocation
    assert!(model.dictionary().is_none());
    assert_eq!(*model.status(), Status::Uninitialized);

    Ok(())
}

#[test]
fn test_scenario_c_residual_disabled_stays_zero() -> Result<()> {
    let mut settings = scenario_settings(5);
    settings.training.use_r = false;
    settings.training.store_r = true;

    let mut model = Nmf::new(settings, 5)?;
    model.update(&one_hot_corpus())?;

    assert!(!model.r_history().is_empty());
    for r in model.r_history() {
        assert!(r.iter().all(|&x| x == 0.0));
    }

    Ok(())
}

#[test]
fn test_scenario_d_dominant_topic_inference() -> Result<()> {
    // Hand-built 2-topic dictionary over 5 terms with unit-norm columns
    let s = 1.0 / 2.0_f64.sqrt();
    let dictionary = Dictionary::from_parts(array![
        [s, 0.0],
        [s, 0.0],
        [0.0, s],
        [0.0, s],
        [0.0, 0.0]
    ]);

    let model = Nmf::from_parts(scenario_settings(1), 5, dictionary)?;

    // A document whose true activation is ≈ [0.9, 0.05]
    let bow = vec![(0, 4.5), (1, 4.5), (2, 0.25), (3, 0.25)];
    let topics = model.document_topics(&bow, Some(0.5))?;

    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0].0, 0);
    assert!(topics[0].1 > 0.5);

    Ok(())
}

#[test]
fn test_inference_matches_training_activation() -> Result<()> {
    let mut settings = scenario_settings(50);
    settings.training.store_h = true;

    let corpus = clustered_corpus();
    let mut model = Nmf::new(settings, 5)?;
    model.update(&corpus)?;

    // Strongest topic of the first training document, from the stored H of
    // the final chunk
    let h = model.h_history().last().expect("history retained");
    let trained_topic = (0..2)
        .max_by(|&a, &b| h[[a, 0]].partial_cmp(&h[[b, 0]]).unwrap())
        .unwrap();

    // The same document inferred as held-out
    let inferred = model.document_topics(&corpus.documents()[0], Some(0.0))?;
    let inferred_topic = inferred
        .iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .expect("non-empty distribution")
        .0;

    assert_eq!(trained_topic, inferred_topic);

    Ok(())
}

#[test]
fn test_dictionary_invariants_after_training() -> Result<()> {
    let mut settings = scenario_settings(5);
    settings.training.use_r = true;
    settings.training.store_h = true;
    settings.training.store_r = true;

    let mut model = Nmf::new(settings, 5)?;
    model.update(&clustered_corpus())?;

    let dictionary = model.dictionary().expect("model is trained");
    assert!(dictionary.matrix().iter().all(|&x| x >= 0.0));
    for norm in dictionary.column_norms() {
        assert!(norm <= 1.0 + 1e-12);
    }

    // H non-negative, residual bounded by the derived cap (max count is 3)
    for h in model.h_history() {
        assert!(h.iter().all(|&x| x >= 0.0));
    }
    for r in model.r_history() {
        assert!(r.iter().all(|&x| x.abs() <= 3.0 + 1e-12));
    }

    assert_eq!(*model.status(), Status::Done);

    Ok(())
}

#[test]
fn test_term_topics() -> Result<()> {
    let mut model = Nmf::new(scenario_settings(5), 5)?;
    model.update(&clustered_corpus())?;

    // Term 0 carries weight in at least one topic
    let topics = model.term_topics(0, Some(1e-6))?;
    assert!(!topics.is_empty());
    assert!(topics.iter().all(|&(id, weight)| id < 2 && weight >= 1e-6));

    // Out-of-vocabulary lookups fail
    let error = model.term_topics(9, None).unwrap_err();
    assert_eq!(
        error.downcast::<NmfError>()?,
        NmfError::UnknownTerm {
            term_id: 9,
            n_features: 5
        }
    );

    Ok(())
}

#[test]
fn test_top_topics() -> Result<()> {
    let mut model = Nmf::new(scenario_settings(5), 5)?;
    model.update(&clustered_corpus())?;

    let shown = model.top_topics(2, 3)?;
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[0].0, 0);
    assert_eq!(shown[1].0, 1);
    for (_, terms) in &shown {
        assert_eq!(terms.len(), 3);
        // Terms come sorted by descending weight
        for pair in terms.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
    }

    // A strict subset is balanced between the sparsest and densest topics
    let subset = model.top_topics(1, 2)?;
    assert_eq!(subset.len(), 1);

    Ok(())
}

#[test]
fn test_dimension_mismatch_is_fatal() -> Result<()> {
    let mut model = Nmf::new(scenario_settings(1), 5)?;
    let corpus = Corpus::from_documents(vec![vec![(0, 1.0)], vec![(7, 1.0)]]);

    let error = model.update(&corpus).unwrap_err();
    assert_eq!(
        error.downcast::<NmfError>()?,
        NmfError::DimensionMismatch {
            expected: 5,
            term_id: 7
        }
    );
    assert_eq!(*model.status(), Status::Failed);

    // The model stays usable: a corrected corpus trains to completion
    model.update(&one_hot_corpus())?;
    assert_eq!(*model.status(), Status::Done);

    Ok(())
}

#[test]
fn test_invalid_configuration_rejected_up_front() {
    let mut settings = Settings::new();
    settings.model.num_topics = 0;
    assert!(Nmf::new(settings, 5).is_err());

    let mut settings = Settings::new();
    settings.training.kappa = -1.0;
    assert!(Nmf::new(settings, 5).is_err());

    assert!(Nmf::new(Settings::new(), 0).is_err());
}
