//! Integration tests for the ML manager
//!
//! Each test works in its own temp directory holding the model artifacts and
//! the CSV dataset, so bootstrap, reload and retrain paths touch real files.

#[cfg(test)]
mod manager_tests {
    use crate::error::{PredictionError, ValidationError};
    use crate::health::{Component, ComponentStatus, HealthRegistry};
    use crate::learning::{BootstrapConfig, SyntheticDataGenerator, TrainingDataset};
    use crate::models::SensorPacket;
    use crate::physics::calculate_et0;
    use crate::predictor::{
        DiseaseFeatures, DiseaseRisk, IngestOutcome, InitOutcome, MlConfig, MlManager,
        RetrainOutcome, RetrainRequest, RetrainWorker, WaterEvent, WATER_MODEL_FILE,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(dir: &TempDir, bootstrap_rows: usize) -> MlConfig {
        MlConfig {
            model_dir: dir.path().join("models"),
            dataset_path: dir.path().join("data").join("training_data.csv"),
            bootstrap_rows,
            buffer_capacity: 10,
            ..Default::default()
        }
    }

    fn valid_packet(i: usize) -> SensorPacket {
        SensorPacket::new(40.0 + i as f64, 28.0, 55.0)
            .with_wind(10.0)
            .with_soil(1.4, 6.4)
    }

    fn fill_buffer(manager: &MlManager, count: usize) -> Vec<IngestOutcome> {
        (0..count)
            .map(|i| {
                let packet = valid_packet(i);
                let et0 = calculate_et0(packet.temperature, packet.humidity, 10.0);
                manager
                    .ingest(&packet, 1_700_000_000 + i as i64 * 60, et0, None)
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_predictions_fail_before_init() {
        let dir = TempDir::new().unwrap();
        let manager = MlManager::new(config(&dir, 300));
        assert!(!manager.models_loaded());
        assert_eq!(
            manager.predict_water_demand(40.0, 30.0, 50.0, 10.0, 6.0),
            Err(PredictionError::ModelsNotLoaded)
        );
        assert_eq!(
            manager.predict_nutrients(6.5, 1.0, 40.0),
            Err(PredictionError::ModelsNotLoaded)
        );
    }

    #[test]
    fn test_bootstrap_then_reload_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, 600);

        let first = MlManager::new(cfg.clone());
        assert_eq!(first.init().unwrap(), InitOutcome::Bootstrapped);
        assert!(first.is_bootstrapped());
        assert_eq!(first.model_version().as_deref(), Some("v1"));

        let dataset_before = std::fs::read(&cfg.dataset_path).unwrap();
        assert_eq!(TrainingDataset::load(&cfg.dataset_path).unwrap().len(), 600);

        let second = MlManager::new(cfg.clone());
        assert_eq!(second.init().unwrap(), InitOutcome::Loaded);
        assert!(second.is_bootstrapped());
        assert_eq!(second.model_version().as_deref(), Some("v1"));
        assert_eq!(std::fs::read(&cfg.dataset_path).unwrap(), dataset_before);
    }

    #[test]
    fn test_trains_from_existing_dataset() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, 600);

        let mut dataset = TrainingDataset::new(&cfg.dataset_path);
        dataset.append(
            SyntheticDataGenerator::new(BootstrapConfig {
                rows: 400,
                seed: Some(9),
                end_timestamp: 1_700_000_000,
            })
            .generate(),
        );
        dataset.save().unwrap();

        let manager = MlManager::new(cfg);
        assert_eq!(manager.init().unwrap(), InitOutcome::TrainedFromDataset);
        assert!(!manager.is_bootstrapped());
        assert_eq!(manager.stats().training_rows, Some(400));
    }

    #[test]
    fn test_short_dataset_topped_up_with_bootstrap() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, 300);

        let mut dataset = TrainingDataset::new(&cfg.dataset_path);
        dataset.append(
            SyntheticDataGenerator::new(BootstrapConfig {
                rows: 5,
                seed: Some(3),
                end_timestamp: 1_700_000_000,
            })
            .generate(),
        );
        dataset.save().unwrap();

        let manager = MlManager::new(cfg.clone());
        assert_eq!(manager.init().unwrap(), InitOutcome::Bootstrapped);
        assert!(manager.models_loaded());
        assert!(manager.is_bootstrapped());
        // Field rows kept alongside the synthetic ones
        assert_eq!(TrainingDataset::load(&cfg.dataset_path).unwrap().len(), 305);
        assert_eq!(manager.stats().training_rows, Some(305));
    }

    #[test]
    fn test_check_dataset_reports_unreadable_file() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, 300);
        let manager = MlManager::new(cfg.clone());
        manager.init().unwrap();
        assert_eq!(manager.check_dataset().unwrap(), 300);

        std::fs::write(&cfg.dataset_path, "soil_moisture\nnot-a-number\n").unwrap();
        assert!(manager.check_dataset().is_err());
    }

    #[test]
    fn test_tampered_artifacts_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, 400);
        MlManager::new(cfg.clone()).init().unwrap();

        std::fs::write(cfg.model_dir.join(WATER_MODEL_FILE), b"{\"tampered\":true}").unwrap();

        let manager = MlManager::new(cfg);
        assert_eq!(manager.init().unwrap(), InitOutcome::TrainedFromDataset);
        // Bootstrap origin survives the refit
        assert!(manager.is_bootstrapped());
        assert_eq!(manager.model_version().as_deref(), Some("v2"));
    }

    #[test]
    fn test_force_retrain_refits_existing_models() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, 400);
        MlManager::new(cfg.clone()).init().unwrap();

        let manager = MlManager::new(MlConfig {
            force_retrain: true,
            ..cfg
        });
        assert_eq!(manager.init().unwrap(), InitOutcome::TrainedFromDataset);
    }

    #[test]
    fn test_preemptive_irrigation_prediction() {
        let dir = TempDir::new().unwrap();
        let manager = MlManager::new(config(&dir, 2_000));
        manager.init().unwrap();

        let et0 = calculate_et0(35.0, 25.0, 20.0);
        let dry = manager.predict_water_demand(35.0, 35.0, 25.0, 20.0, et0).unwrap();
        assert_eq!(dry.event, WaterEvent::PreemptiveIrrigation);
        assert!(dry.predicted_loss_24h > 10.0 && dry.predicted_loss_24h < 15.0);
        assert!(dry.time_to_critical_hours > 5.0 && dry.time_to_critical_hours < 15.0);

        let wet = manager.predict_water_demand(55.0, 35.0, 25.0, 20.0, et0).unwrap();
        assert_eq!(wet.event, WaterEvent::Normal);
    }

    #[test]
    fn test_non_finite_inputs_rejected() {
        let dir = TempDir::new().unwrap();
        let manager = MlManager::new(config(&dir, 400));
        manager.init().unwrap();

        assert_eq!(
            manager.predict_water_demand(40.0, f64::NAN, 50.0, 10.0, 5.0),
            Err(PredictionError::NonFiniteInput("temperature"))
        );
        assert_eq!(
            manager.predict_nutrients(6.5, f64::INFINITY, 40.0),
            Err(PredictionError::NonFiniteInput("ec_salinity"))
        );
    }

    #[test]
    fn test_disease_risk_follows_wetness() {
        let dir = TempDir::new().unwrap();
        let manager = MlManager::new(config(&dir, 3_000));
        manager.init().unwrap();

        let wet = manager
            .predict_disease_risk(&DiseaseFeatures {
                mean_temperature_window: 22.0,
                humidity_duration_hours: 14.0,
                temperature_range: 6.0,
            })
            .unwrap();
        assert_eq!(wet.risk, DiseaseRisk::HighRisk);

        let dry = manager
            .predict_disease_risk(&DiseaseFeatures {
                mean_temperature_window: 38.0,
                humidity_duration_hours: 0.0,
                temperature_range: 10.0,
            })
            .unwrap();
        assert_eq!(dry.risk, DiseaseRisk::LowRisk);
        assert!(dry.probability < wet.probability);
    }

    #[test]
    fn test_invalid_packet_not_buffered() {
        let dir = TempDir::new().unwrap();
        let manager = MlManager::new(config(&dir, 300));

        let packet = SensorPacket::new(40.0, 28.0, 55.0).with_wind(10.0);
        assert_eq!(
            manager.ingest(&packet, 0, 5.0, None),
            Err(ValidationError::MissingField("ec_salinity"))
        );
        assert!(manager.buffer_stats().entries == 0);
    }

    #[test]
    fn test_full_buffer_retrains_inline_and_graduates() {
        let dir = TempDir::new().unwrap();
        let cfg = MlConfig {
            max_mae_regression: 10.0,
            ..config(&dir, 600)
        };
        let manager = MlManager::new(cfg.clone());
        manager.init().unwrap();
        assert!(manager.is_bootstrapped());

        let outcomes = fill_buffer(&manager, 10);
        assert_eq!(outcomes[0], IngestOutcome::Buffered { len: 1 });
        assert_eq!(outcomes[8], IngestOutcome::Buffered { len: 9 });
        match &outcomes[9] {
            IngestOutcome::Retrained(RetrainOutcome::Swapped { version, rows, graduated }) => {
                assert_eq!(version, "v2");
                assert_eq!(*rows, 610);
                assert!(*graduated);
            }
            other => panic!("unexpected outcome {:?}", other),
        }

        assert!(!manager.is_bootstrapped());
        assert_eq!(manager.buffer_stats().entries, 0);
        assert_eq!(TrainingDataset::load(&cfg.dataset_path).unwrap().len(), 610);

        // Graduation is persisted
        let reloaded = MlManager::new(cfg);
        assert_eq!(reloaded.init().unwrap(), InitOutcome::Loaded);
        assert!(!reloaded.is_bootstrapped());
    }

    #[test]
    fn test_degraded_retrain_is_rejected() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, 300);
        let manager = MlManager::new(cfg.clone());
        manager.init().unwrap();

        // Corrupt the labels of everything outside the holdout slice
        let mut dataset = TrainingDataset::load(&cfg.dataset_path).unwrap();
        let mut rows = dataset.rows().to_vec();
        for row in rows.iter_mut().take(240) {
            row.moisture_delta_next_24h = 40.0;
        }
        dataset = TrainingDataset::new(&cfg.dataset_path);
        dataset.append(rows);
        dataset.save().unwrap();

        match manager.retrain_with(Vec::new()).unwrap() {
            RetrainOutcome::Rejected {
                candidate_mae,
                current_mae,
            } => assert!(candidate_mae > current_mae * 1.2),
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(manager.model_version().as_deref(), Some("v1"));
        assert!(manager.is_bootstrapped());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_background_worker_swaps_bundle() {
        let dir = TempDir::new().unwrap();
        let manager = Arc::new(MlManager::new(MlConfig {
            max_mae_regression: 10.0,
            ..config(&dir, 600)
        }));
        manager.init().unwrap();

        let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
        let handle = manager.spawn_worker(None, shutdown_rx);
        assert!(manager.has_worker());

        let outcomes = fill_buffer(&manager, 10);
        assert_eq!(outcomes[9], IngestOutcome::RetrainQueued);

        let mut swapped = false;
        for _ in 0..200 {
            if manager.model_version().as_deref() == Some("v2") {
                swapped = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        assert!(swapped, "worker did not swap in the retrained bundle");
        assert!(!manager.is_bootstrapped());

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_marks_unreadable_dataset_degraded() {
        let dir = TempDir::new().unwrap();
        let cfg = config(&dir, 300);
        let manager = Arc::new(MlManager::new(cfg.clone()));
        manager.init().unwrap();

        let health = HealthRegistry::with_components();
        let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
        let handle = manager.spawn_worker(Some(health.clone()), shutdown_rx);

        std::fs::write(&cfg.dataset_path, "soil_moisture\nnot-a-number\n").unwrap();
        assert_eq!(fill_buffer(&manager, 10)[9], IngestOutcome::RetrainQueued);

        let mut degraded = false;
        for _ in 0..200 {
            let snapshot = health.health().await;
            if snapshot.components[&Component::Dataset].status == ComponentStatus::Degraded {
                degraded = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        assert!(degraded, "dataset failure not reported");
        let snapshot = health.health().await;
        assert_eq!(
            snapshot.components[&Component::Retrainer].status,
            ComponentStatus::Degraded
        );
        assert_eq!(manager.model_version().as_deref(), Some("v1"));

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_worker_finishes_queued_batches_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let manager = Arc::new(MlManager::new(MlConfig {
            max_mae_regression: 10.0,
            ..config(&dir, 300)
        }));
        manager.init().unwrap();

        let (tx, rx) = tokio::sync::mpsc::channel(4);
        tx.send(RetrainRequest { entries: Vec::new() }).await.unwrap();
        tx.send(RetrainRequest { entries: Vec::new() }).await.unwrap();

        // Shutdown already pending when the worker starts
        let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
        shutdown_tx.send(()).unwrap();

        RetrainWorker::new(Arc::clone(&manager), rx, None)
            .run(shutdown_rx)
            .await;

        assert_eq!(manager.model_version().as_deref(), Some("v3"));
        assert!(tx.send(RetrainRequest { entries: Vec::new() }).await.is_err());
    }

    #[test]
    fn test_stopped_worker_falls_back_to_inline() {
        let dir = TempDir::new().unwrap();
        let manager = MlManager::new(MlConfig {
            max_mae_regression: 10.0,
            ..config(&dir, 400)
        });
        manager.init().unwrap();
        manager.stop_worker();
        assert!(!manager.has_worker());

        let outcomes = fill_buffer(&manager, 10);
        assert!(matches!(outcomes[9], IngestOutcome::Retrained(_)));
    }
}
