// Top-orders query over the entity graph and over raw SQL
pub mod order_aggregation;

// Idempotent demo data population
pub mod seeder;
