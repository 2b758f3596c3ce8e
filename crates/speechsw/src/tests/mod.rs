mod module_scenarios;
