mod tick_math_test;
