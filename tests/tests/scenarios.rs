use std::sync::Arc;

use ecgai::infer::InferError;
use ecgai::report::{Degradation, Language};
use ecgai::waveform::{build_nominal_tensor, decode, EcgSchema, Lead, LeadLayout, NOMINAL_SAMPLES};
use ecgai::{Config, EcgPipeline, PipelineError};
use ecgai_e2e::{
    annotated_record, one_hot, resting_record, Behaviour, FakeServer, RECORDED_LEADS, RHYTHM_MODEL,
    STEMI_MODEL,
};
use pretty_assertions::assert_eq;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn pipeline(server: &Arc<FakeServer>) -> EcgPipeline {
    EcgPipeline::connect_with(&Config::default(), Arc::clone(server))
        .map_err(|e| e.to_string())
        .unwrap()
}

#[test]
fn resting_record_fills_all_twelve_channels() {
    init_logger();
    let bytes = resting_record(&RECORDED_LEADS, NOMINAL_SAMPLES);
    let record = decode(&bytes, EcgSchema::Resting).unwrap();
    assert_eq!(record.samples.leads().collect::<Vec<_>>(), Lead::ALL.to_vec());
    assert_eq!(record.machine_statements, vec!["Sinus rhythm".to_string()]);

    let tensor = build_nominal_tensor(&record.samples, &LeadLayout::stemi());
    assert_eq!(tensor.shape(), [1, NOMINAL_SAMPLES, 12]);
    assert!(tensor.missing().is_empty());
    for channel in 0..12 {
        assert!(
            tensor.channel(channel).iter().any(|v| *v != 0.0),
            "channel {channel} is zero-filled"
        );
    }

    let iii = record.samples.get(Lead::III).unwrap();
    let (one, two) = (record.samples.get(Lead::I).unwrap(), record.samples.get(Lead::II).unwrap());
    approx::assert_relative_eq!(iii[17], two[17] - one[17], epsilon = 1e-12);
}

#[test]
fn annotated_record_decimates_to_nominal_length() {
    let record = decode(&annotated_record(2 * NOMINAL_SAMPLES), EcgSchema::Annotated).unwrap();
    assert_eq!(record.samples.len(), 12);
    assert!(record.samples.iter().all(|(_, values)| values.len() == NOMINAL_SAMPLES));
    assert!(record.machine_statements.is_empty());
}

#[test]
fn full_report_with_both_models() {
    init_logger();
    let server = Arc::new(FakeServer::new(
        Behaviour::Answers(vec![0.2]),
        Behaviour::Answers(one_hot(5, 0.97)),
    ));
    let report = pipeline(&server)
        .run(
            &resting_record(&RECORDED_LEADS, NOMINAL_SAMPLES),
            EcgSchema::Resting,
            Language::English,
        )
        .unwrap();

    assert!(!report.stemi.positive);
    approx::assert_relative_eq!(report.stemi.display, 0.8, epsilon = 1e-9);
    assert!(report.narrative.contains("Normal Sinus Rhythm (NSR)"));
    assert!(report.narrative.contains("> 95%"));
    assert!(report.narrative.contains("No ST-Elevation Myocardial Infarction"));
    assert_eq!(
        report.results.iter().map(|p| p.label.as_str()).collect::<Vec<_>>(),
        vec!["NSR", "STEMI"]
    );
    assert!(report.degradations.is_empty());
    assert!(report.image.starts_with(&[0x89, b'P', b'N', b'G']));

    assert_eq!(
        server.requests(),
        vec![
            (STEMI_MODEL.to_string(), vec![1, NOMINAL_SAMPLES, 12]),
            (RHYTHM_MODEL.to_string(), vec![1, NOMINAL_SAMPLES, 8]),
        ]
    );
}

#[test]
fn rhythm_outage_still_reports_stemi() {
    init_logger();
    let server = Arc::new(FakeServer::new(Behaviour::Answers(vec![0.8]), Behaviour::DropsCalls));
    let report = pipeline(&server)
        .run(
            &resting_record(&RECORDED_LEADS, NOMINAL_SAMPLES),
            EcgSchema::Resting,
            Language::English,
        )
        .unwrap();

    assert!(report.stemi.positive);
    assert!(report
        .narrative
        .contains("Suspected ST-Elevation Myocardial Infarction (STEMI)"));
    assert!(report.narrative.contains("Rhythm analysis unavailable"));
    assert_eq!(report.results.len(), 1);
    assert!(matches!(
        &report.degradations[0],
        Degradation::PartialAnalysisUnavailable { model, .. } if model == RHYTHM_MODEL
    ));
}

#[test]
fn stemi_outage_is_terminal() {
    let server = Arc::new(FakeServer::new(
        Behaviour::DropsCalls,
        Behaviour::Answers(one_hot(0, 0.9)),
    ));
    let result = pipeline(&server).run(
        &resting_record(&RECORDED_LEADS, NOMINAL_SAMPLES),
        EcgSchema::Resting,
        Language::English,
    );
    match result {
        Err(PipelineError::Inference { model, source }) => {
            assert_eq!(model, STEMI_MODEL);
            assert!(matches!(source, InferError::ServiceUnavailable { .. }));
        }
        Err(other) => panic!("unexpected error {other}"),
        Ok(_) => panic!("a report was produced without the ST-elevation verdict"),
    }
    assert_eq!(server.requests().len(), 1);
}

#[test]
fn stemi_model_loading_blocks_construction() {
    let server = Arc::new(FakeServer::new(Behaviour::Loading, Behaviour::Answers(one_hot(0, 0.9))));
    let err = EcgPipeline::connect_with(&Config::default(), server).err().unwrap();
    assert_eq!(err.kind(), "service-unavailable");
}

#[test]
fn malformed_record_is_entered_in_error() {
    let server = Arc::new(FakeServer::new(
        Behaviour::Answers(vec![0.8]),
        Behaviour::Answers(one_hot(0, 0.9)),
    ));
    let err = pipeline(&server)
        .run(b"<RestingECG><Waveform/></RestingECG>", EcgSchema::Resting, Language::English)
        .err()
        .unwrap();
    assert!(err.is_entered_in_error());
    assert!(server.requests().is_empty());
}

#[test]
fn partial_record_degrades_rendering_only() {
    let server = Arc::new(FakeServer::new(
        Behaviour::Answers(vec![0.6]),
        Behaviour::Answers(one_hot(10, 0.7)),
    ));
    let leads = [Lead::I, Lead::II, Lead::V1, Lead::V2];
    let report = pipeline(&server)
        .run(
            &resting_record(&leads, NOMINAL_SAMPLES),
            EcgSchema::Resting,
            Language::TraditionalChinese,
        )
        .unwrap();

    assert!(report.narrative.contains("(ST)"));
    assert!(report.narrative.contains("70.00%"));
    match report.degradations.as_slice() {
        [Degradation::RenderingDegraded { missing }] => {
            assert_eq!(missing, &vec![Lead::V3, Lead::V4, Lead::V5, Lead::V6]);
        }
        other => panic!("unexpected degradations {other:?}"),
    }
}

#[test]
fn identical_input_gives_identical_report() {
    let server = Arc::new(FakeServer::new(
        Behaviour::Answers(vec![0.8]),
        Behaviour::Answers(one_hot(0, 0.9)),
    ));
    let pipeline = pipeline(&server);
    let bytes = resting_record(&RECORDED_LEADS, NOMINAL_SAMPLES);

    let first = pipeline.run(&bytes, EcgSchema::Resting, Language::English).unwrap();
    let second = pipeline.run(&bytes, EcgSchema::Resting, Language::English).unwrap();
    assert_eq!(first.narrative, second.narrative);
    assert!(first.image == second.image);
    assert_eq!(first.findings, second.findings);

    let calls = server.calls();
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0], calls[2]);
    assert_eq!(calls[1], calls[3]);
    assert!(calls[0].data != calls[1].data);
}

#[test]
fn rhythm_model_serving_its_own_tensor_names() {
    init_logger();
    let server = Arc::new(
        FakeServer::new(Behaviour::Answers(vec![0.2]), Behaviour::Answers(one_hot(0, 0.9)))
            .with_served_names(RHYTHM_MODEL, "conv1d_input", "dense_3/Softmax"),
    );
    let report = pipeline(&server)
        .run(
            &resting_record(&RECORDED_LEADS, NOMINAL_SAMPLES),
            EcgSchema::Resting,
            Language::English,
        )
        .unwrap();

    assert!(report.rhythm_available());
    assert!(report.degradations.is_empty());
    assert_eq!(
        report.results.iter().map(|p| p.label.as_str()).collect::<Vec<_>>(),
        vec!["AFIB", "STEMI"]
    );
}
