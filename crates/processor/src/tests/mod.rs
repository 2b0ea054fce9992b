mod fixtures;
mod ledger_scenarios;
