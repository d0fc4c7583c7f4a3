use std::io::Write;

use approx::assert_abs_diff_eq;
use discrete_hmm::{
    parse_model, read_model, read_unlabeled_path, write_model, BackwardEngine, BaumWelchConfig,
    BaumWelchTrainer, ForwardEngine, HmmModel, LabeledDataset, OutputSpace, ParameterSet,
    PiEstimate, SupervisedTrainer, ViterbiDecoder, Vocabulary,
};

const STAMP_MODEL: &str = "\
# Mark Stamp, A Revealing Introduction to Hidden Markov Models
Z=H,C
X=S,M,L
A=0.7,0.3;0.4,0.6
B=0.1,0.4,0.5;0.7,0.2,0.1
Pi=0.6,0.4
";

fn encode(model: &HmmModel, symbols: &[&str]) -> Vec<usize> {
    symbols
        .iter()
        .map(|s| model.symbols.id(s).expect("symbol in vocabulary"))
        .collect()
}

#[test]
fn stamp_model_scores_and_decodes_reference_sequence() {
    let model = parse_model(STAMP_MODEL).unwrap();
    let obs = encode(&model, &["S", "M", "S", "L"]);

    let fwd = ForwardEngine::new(&model.params).compute(&obs, 3).unwrap();
    let bwd = BackwardEngine::new(&model.params).compute(&obs).unwrap();
    assert_abs_diff_eq!(fwd.log_likelihood.exp(), 0.0096296, epsilon = 1e-6);
    assert_abs_diff_eq!(bwd.log_likelihood, fwd.log_likelihood, epsilon = 1e-12);

    let best = ViterbiDecoder::new(&model.params).decode(&obs, 3).unwrap();
    let labels: Vec<&str> = best
        .states
        .iter()
        .map(|&s| model.states.label(s).unwrap())
        .collect();
    assert_eq!(labels, vec!["C", "C", "C", "H"]);
    assert!(best.log_prob < fwd.log_likelihood);
}

#[test]
fn labeled_corpus_trains_saves_and_reloads() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("corpus.tsv");
    {
        let mut file = std::fs::File::create(&corpus).unwrap();
        for _ in 0..20 {
            writeln!(file, "DT\tthe").unwrap();
            writeln!(file, "NN\tdog").unwrap();
            writeln!(file, "VB\truns").unwrap();
            writeln!(file, "DT\ta").unwrap();
            writeln!(file, "NN\tcat").unwrap();
            writeln!(file, "VB\tsleeps").unwrap();
        }
    }

    let dataset = LabeledDataset::from_path(&corpus).unwrap();
    let params = SupervisedTrainer::new(
        dataset.states.len(),
        dataset.symbols.len(),
        PiEstimate::FirstState,
    )
    .train(&dataset.pairs)
    .unwrap();
    assert!(params.is_row_stochastic(1e-9));

    let model = HmmModel::new(dataset.states.clone(), dataset.symbols.clone(), params).unwrap();
    let path = dir.path().join("tagger.hmm");
    write_model(&path, &model, OutputSpace::Log).unwrap();
    let reloaded = read_model(&path).unwrap();
    assert_eq!(reloaded, model);

    let sentence = encode(&reloaded, &["a", "dog", "sleeps"]);
    let decoder = ViterbiDecoder::new(&reloaded.params);
    let best = decoder.decode_all(&sentence).unwrap();
    let tags: Vec<&str> = best
        .states
        .iter()
        .map(|&s| reloaded.states.label(s).unwrap())
        .collect();
    assert_eq!(tags, vec!["DT", "NN", "VB"]);
}

#[test]
fn unlabeled_corpus_trains_with_baum_welch() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("unlabeled.txt");
    {
        let mut file = std::fs::File::create(&corpus).unwrap();
        for i in 0..60 {
            let symbol = if (i / 10) % 2 == 0 {
                ["A", "C", "A", "G"][i % 4]
            } else {
                ["T", "T", "G", "T"][i % 4]
            };
            writeln!(file, "{}", symbol).unwrap();
        }
    }

    let mut model = parse_model(
        "X=A,C,G,T\nZ=+,-\nA=0.8,0.2;0.3,0.7\nB=0.3,0.3,0.2,0.2;0.2,0.2,0.2,0.4\nPi=0.5,0.5\n",
    )
    .unwrap();
    let obs = read_unlabeled_path(&corpus, &mut model.symbols, Vocabulary::Frozen).unwrap();
    assert_eq!(obs.len(), 60);

    let before = ForwardEngine::new(&model.params)
        .compute(&obs, obs.len() - 1)
        .unwrap()
        .log_likelihood;
    let mut trainer = BaumWelchTrainer::new(BaumWelchConfig::new(1e-8, 100)).unwrap();
    let report = trainer.train(&mut model.params, &obs).unwrap();

    assert!(report.final_log_likelihood() > before);
    assert_abs_diff_eq!(report.log_likelihoods[0], before, epsilon = 1e-9);
    assert!(model.params.is_row_stochastic(1e-6));

    let after = ForwardEngine::new(&model.params)
        .compute(&obs, obs.len() - 1)
        .unwrap()
        .log_likelihood;
    assert_abs_diff_eq!(after, report.final_log_likelihood(), epsilon = 1e-9);
}

#[test]
fn independent_sequences_score_concurrently_against_shared_parameters() {
    let params = ParameterSet::uniform(3, 4).unwrap();
    let sequences: Vec<Vec<usize>> = (1..6)
        .map(|n| (0..n * 7).map(|t| t % 4).collect())
        .collect();

    let scores: Vec<f64> = std::thread::scope(|scope| {
        let handles: Vec<_> = sequences
            .iter()
            .map(|obs| {
                let params = &params;
                scope.spawn(move || {
                    ForwardEngine::new(params)
                        .compute(obs, obs.len() - 1)
                        .unwrap()
                        .log_likelihood
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (obs, score) in sequences.iter().zip(scores) {
        // Uniform model: every sequence of length T has probability 4^-T.
        assert_abs_diff_eq!(score, -(obs.len() as f64) * 4f64.ln(), epsilon = 1e-9);
    }
}
