use ormopt_core::optimize::constraint::ConstraintRule;
use ormopt_core::optimize::expression::LinearExpr;
use ormopt_core::optimize::objective::ObjectiveSense;
use ormopt_core::optimize::solvers::clarabel::ClarabelSolver;
use ormopt_core::optimize::solvers::SolverOptions;
use ormopt_core::optimize::variable::Domain;
use ormopt_core::optimize::OptimizationStatus;
use ormopt_core::orm::ledger::{problem_details, problem_runs};
use ormopt_core::orm::{
    orm_constraint, orm_objective, OrmParam, OrmParamBuilder, OrmSetBuilder, OrmVarBuilder, Problem,
    ProblemDefinition, ProblemState,
};
use ormopt_core::store::{
    ColumnBuilder, ColumnKind, MemoryStore, QuerySet, RecordStore, RecordType, Schema, Value,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn diet_schema() -> Schema {
    let food = RecordType::new("Food", "foods")
        .with_column(
            ColumnBuilder::default()
                .name("name")
                .kind(ColumnKind::Text)
                .nullable(false)
                .unique(true)
                .build()
                .unwrap(),
        )
        .with_attribute("cost", ColumnKind::Float);
    let nutrient = RecordType::new("Nutrient", "nutrients")
        .with_attribute("name", ColumnKind::Text)
        .with_attribute("lower_bound", ColumnKind::Float)
        .with_attribute("upper_bound", ColumnKind::Float);
    let amount = RecordType::new("FoodNutrientAmount", "food_nutrient_amounts")
        .with_foreign_key("food_id", "foods", "id")
        .with_foreign_key("nutrient_id", "nutrients", "id")
        .with_attribute("amount", ColumnKind::Float);
    Schema::new()
        .with_record_type(food)
        .and_then(|s| s.with_record_type(nutrient))
        .and_then(|s| s.with_record_type(amount))
        .unwrap()
}

/// Foods A and B, protein of at least 10 and fat of at most 4
fn diet_store() -> MemoryStore {
    let mut store = MemoryStore::new(diet_schema());
    let a = store
        .insert_values("Food", [("name", Value::from("A")), ("cost", Value::from(2.))])
        .unwrap();
    let b = store
        .insert_values("Food", [("name", Value::from("B")), ("cost", Value::from(3.))])
        .unwrap();
    let protein = store
        .insert_values(
            "Nutrient",
            [("name", Value::from("protein")), ("lower_bound", Value::from(10.))],
        )
        .unwrap();
    let fat = store
        .insert_values(
            "Nutrient",
            [("name", Value::from("fat")), ("upper_bound", Value::from(4.))],
        )
        .unwrap();
    for (food, nutrient, amount) in [(&a, &protein, 2.), (&b, &protein, 4.), (&a, &fat, 1.), (&b, &fat, 1.)] {
        store
            .insert_values(
                "FoodNutrientAmount",
                [
                    ("food_id", Value::from(food.id())),
                    ("nutrient_id", Value::from(nutrient.id())),
                    ("amount", Value::from(amount)),
                ],
            )
            .unwrap();
    }
    store
}

fn nutrient_bound(name: &str, from_attr: &str, default: f64) -> OrmParam {
    OrmParamBuilder::default()
        .name(name)
        .record_type("Nutrient")
        .from_attr(from_attr)
        .indexed_by("id")
        .default_value(default)
        .within(Domain::NonNegativeReals)
        .build()
        .unwrap()
}

fn diet_definition() -> ProblemDefinition {
    ProblemDefinition::new()
        .with_set(OrmSetBuilder::default().name("foods").record_type("Food").build().unwrap())
        .with_set(
            OrmSetBuilder::default()
                .name("nutrients")
                .record_type("Nutrient")
                .build()
                .unwrap(),
        )
        .with_param(
            OrmParamBuilder::default()
                .name("cost")
                .record_type("Food")
                .from_attr("cost")
                .indexed_by("id")
                .within(Domain::NonNegativeReals)
                .build()
                .unwrap(),
        )
        .with_param(
            OrmParamBuilder::default()
                .name("amount")
                .record_type("FoodNutrientAmount")
                .from_attr("amount")
                .indexed_by(["food_id", "nutrient_id"])
                .default_value(0.)
                .within(Domain::NonNegativeReals)
                .build()
                .unwrap(),
        )
        .with_param(nutrient_bound("lower", "lower_bound", 0.))
        .with_param(nutrient_bound("upper", "upper_bound", f64::INFINITY))
        .with_var(
            OrmVarBuilder::default()
                .name("buy")
                .record_type("Food")
                .indexed_by("id")
                .domain(Domain::NonNegativeReals)
                .build()
                .unwrap(),
        )
        .with_constraint(orm_constraint("nutrient_limits", &["nutrients"], |m, idx| {
            let mut expr = LinearExpr::new();
            for food in m.set("foods")? {
                let amount = m.param("amount", &[food.clone(), idx[0].clone()])?;
                expr += amount * m.var_expr("buy", &[food.clone()])?;
            }
            let lower = m.param("lower", idx)?;
            let upper = m.param("upper", idx)?;
            Ok(ConstraintRule::from(expr.between(lower, upper)))
        }))
        .with_objective(orm_objective("total_cost", &[], ObjectiveSense::Minimize, |m, _| {
            let mut expr = LinearExpr::new();
            for food in m.set("foods")? {
                let idx = [food.clone()];
                expr += m.param("cost", &idx)? * m.var_expr("buy", &idx)?;
            }
            Ok(expr)
        }))
}

#[test]
fn clarabel_solves_the_diet_problem() {
    init_logging();
    let mut store = diet_store();
    let mut problem = Problem::new(
        diet_definition(),
        store.schema(),
        "Diet Problem",
        Some("cheapest diet meeting the nutrient bounds"),
        Some("0.1.0"),
    )
    .unwrap();
    problem.create_instance(&store).unwrap();

    let solution = problem
        .solve(&mut store, &ClarabelSolver::new(), &SolverOptions::default())
        .unwrap();
    assert_eq!(solution.status, OptimizationStatus::Optimal);
    assert!((solution.objective_value - 7.5).abs() < 1e-4);
    assert!(solution.value("buy", &[Value::Integer(1)]).unwrap().abs() < 1e-4);
    assert!((solution.value("buy", &[Value::Integer(2)]).unwrap() - 2.5).abs() < 1e-4);
    assert_eq!(problem.state(), ProblemState::Solved);

    let run = problem.current_problem_run().unwrap();
    for record in store.query(&QuerySet::all("FoodNutrientAmount")).unwrap() {
        assert_eq!(record.problem_run_id(), Some(run));
    }
}

#[test]
fn cheaper_food_changes_the_next_instance() {
    init_logging();
    let mut store = diet_store();
    let mut food_a = store
        .find_one(&QuerySet::all("Food").filter_by("name", "A"))
        .unwrap();
    food_a.set("cost", 1.).unwrap();
    store.save(&food_a).unwrap();

    let mut problem =
        Problem::new(diet_definition(), store.schema(), "Diet Problem", None, None).unwrap();
    problem.create_instance(&store).unwrap();
    let solution = problem
        .solve(&mut store, &ClarabelSolver::new(), &SolverOptions::default())
        .unwrap();
    // A is the cheaper protein source until the fat bound binds at A = 3, B = 1
    assert!((solution.objective_value - 6.).abs() < 1e-4);
    assert!((solution.value("buy", &[Value::Integer(1)]).unwrap() - 3.).abs() < 1e-4);
    assert!((solution.value("buy", &[Value::Integer(2)]).unwrap() - 1.).abs() < 1e-4);
}

#[test]
fn every_solve_is_recorded_under_one_detail() {
    init_logging();
    let mut store = diet_store();
    let mut problem =
        Problem::new(diet_definition(), store.schema(), "Diet Problem", None, None).unwrap();
    problem.create_instance(&store).unwrap();
    let solver = ClarabelSolver::new();
    problem.solve(&mut store, &solver, &SolverOptions::default()).unwrap();
    problem.solve(&mut store, &solver, &SolverOptions::default()).unwrap();

    let details = problem_details(&store).unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].name.as_deref(), Some("Diet Problem"));
    let runs = problem_runs(&store, details[0].id).unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(problem.current_problem_run(), Some(runs[1].id));

    let food = store.get("Food", 2).unwrap();
    assert_eq!(food.problem_run_id(), Some(runs[1].id));
}

#[test]
fn infeasible_diet_is_not_recorded() {
    init_logging();
    let mut store = diet_store();
    let mut fat = store
        .find_one(&QuerySet::all("Nutrient").filter_by("name", "fat"))
        .unwrap();
    // 10 protein needs at least 2.5 units of food
    fat.set("upper_bound", 1.).unwrap();
    store.save(&fat).unwrap();

    let mut problem =
        Problem::new(diet_definition(), store.schema(), "Diet Problem", None, None).unwrap();
    problem.create_instance(&store).unwrap();
    let res = problem.solve(&mut store, &ClarabelSolver::new(), &SolverOptions::default());
    assert!(res.is_err());
    assert_eq!(store.count("ProblemRun"), 0);
    assert_eq!(store.count("ProblemDetail"), 0);
}

#[test]
fn snapshot_round_trip_keeps_the_problem_data() {
    init_logging();
    let store = diet_store();
    let path = std::env::temp_dir().join("ormopt_diet_snapshot.json");
    store.write_json(&path).unwrap();
    let restored = MemoryStore::read_json(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    let problem =
        Problem::new(diet_definition(), restored.schema(), "Diet Problem", None, None).unwrap();
    assert_eq!(problem.data(&restored).unwrap(), problem.data(&store).unwrap());
}
