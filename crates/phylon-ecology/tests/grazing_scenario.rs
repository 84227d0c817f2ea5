//! A herbivore overgrazing a producer, from biomass to committed survivors.

use phylon_core::{NicheSnapshot, PressureModifiers, SpeciesArena, SpeciesId, TurnId};
use phylon_ecology::{
    KinCompetitionCalculator, MortalityConfig, MortalityEngine, MortalityInputs, PopulationUpdater,
    TrophicInteractionCalculator,
};
use phylon_test_utils::SpeciesBuilder;

const TURN_DAYS: f64 = 36_500.0;

fn meadow() -> (SpeciesArena, SpeciesId, SpeciesId) {
    let mut arena = SpeciesArena::new();
    let grass = arena
        .push(
            SpeciesBuilder::new("A")
                .level(1.0)
                .population(10_000)
                .weight(1.0)
                .generation_days(TURN_DAYS)
                .build(),
            None,
        )
        .unwrap();
    let grazer = arena
        .push(
            SpeciesBuilder::new("B")
                .level(2.0)
                .population(500)
                .weight(50.0)
                .length(20.0)
                .generation_days(TURN_DAYS)
                .build(),
            None,
        )
        .unwrap();
    (arena, grass, grazer)
}

#[test]
fn overgrazed_producer_takes_the_capped_trophic_loss() {
    let (arena, grass, grazer) = meadow();
    let trophic = TrophicInteractionCalculator::default().compute(&arena);

    // (500 * 50 * 10) / (10_000 * 1) = 2.5, clipped.
    assert_eq!(trophic.grazing_on(grass), 1.0);
    assert_eq!(trophic.predation_on(grazer), 0.0);

    let niche = NicheSnapshot::new();
    let pressures = PressureModifiers::new();
    let competition = KinCompetitionCalculator::default().compute(&arena, &niche, TurnId(1));
    let engine = MortalityEngine::default();
    let report = engine.evaluate(&MortalityInputs {
        arena: &arena,
        pressures: &pressures,
        niche: &niche,
        resources: None,
        trophic: Some(&trophic),
        competition: Some(&competition),
        turn: TurnId(1),
    });

    let cap = MortalityConfig::default().trophic_cap;
    let a = report.get(grass).unwrap();
    assert_eq!(a.grazing_pressure, 1.0);
    assert_eq!(a.breakdown.trophic_loss, cap);
    assert_eq!(a.breakdown.generations, 1.0);
    assert!((a.death_rate - cap).abs() < 1e-9);
    assert!((5_999..=6_000).contains(&a.deaths));
    assert_eq!(a.survivors, a.initial_population - a.deaths);
}

#[test]
fn starving_grazer_feels_scarcity_not_grazing() {
    let (arena, _, grazer) = meadow();
    let trophic = TrophicInteractionCalculator::default().compute(&arena);
    // 25_000 g of grazers against 0.25 * 10_000 g sustainable: 10 - 1, clipped.
    assert_eq!(trophic.scarcity_for(phylon_core::TrophicBand::Primary), 2.0);

    let niche = NicheSnapshot::new();
    let pressures = PressureModifiers::new();
    let report = MortalityEngine::default().evaluate(&MortalityInputs {
        arena: &arena,
        pressures: &pressures,
        niche: &niche,
        resources: None,
        trophic: Some(&trophic),
        competition: None,
        turn: TurnId(1),
    });
    let b = report.get(grazer).unwrap();
    let cfg = MortalityConfig::default();
    assert_eq!(b.grazing_pressure, 0.0);
    assert_eq!(b.breakdown.resource_loss, cfg.resource_cap);
    assert!((b.death_rate - cfg.resource_cap).abs() < 1e-9);
}

#[test]
fn survivors_carry_into_the_next_turn() {
    let (arena, grass, _) = meadow();
    let trophic = TrophicInteractionCalculator::default().compute(&arena);
    let niche = NicheSnapshot::new();
    let pressures = PressureModifiers::new();
    let report = MortalityEngine::default().evaluate(&MortalityInputs {
        arena: &arena,
        pressures: &pressures,
        niche: &niche,
        resources: None,
        trophic: Some(&trophic),
        competition: None,
        turn: TurnId(1),
    });
    let outcome = PopulationUpdater::default().apply(&arena, &report, TurnId(1));
    let a = outcome.updated.iter().find(|s| s.id == grass).unwrap();
    assert!((4_000..=4_001).contains(&a.population));
    // 0.6 is above the streak threshold but well below collapse.
    assert_eq!(a.high_mortality_streak, 1);
    assert!(a.is_alive());
    assert!(outcome.events.is_empty());
}
