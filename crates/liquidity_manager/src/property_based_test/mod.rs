mod path_property_test;
