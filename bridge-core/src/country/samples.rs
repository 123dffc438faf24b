//! Recorded dial tones: 425 Hz and 400 Hz carriers modulated at 25 Hz.
//! Each table holds exactly one 40 ms modulation period and loops cleanly.

pub static AUSTRALIA_DIAL_TONE: [i16; 320] = [
    0, 1018, 1949, 2685, 3138, 3252, 3004, 2413, 1538, 469, -676, -1773,
    -2695, -3337, -3619, -3503, -2993, -2137, -1025, 224, 1473, 2582, 3423, 3898,
    3946, 3555, 2760, 1644, 324, -1053, -2335, -3378, -4060, -4301, -4065, -3374,
    -2296, -948, 524, 1957, 3191, 4086, 4537, 4489, 3941, 2949, 1617, 92,
    -1459, -2864, -3964, -4634, -4796, -4426, -3562, -2296, -765, 863, 2406, 3693,
    4579, 4963, 4798, 4101, 2946, 1458, -198, -1839, -3283, -4369, -4975, -5032,
    -4532, -3530, -2134, -500, 1192, 2754, 4013, 4829, 5112, 4829, 4013, 2754,
    1192, -500, -2134, -3530, -4532, -5032, -4975, -4369, -3283, -1839, -198, 1458,
    2946, 4101, 4798, 4963, 4579, 3693, 2406, 863, -765, -2296, -3562, -4426,
    -4796, -4634, -3964, -2864, -1459, 92, 1617, 2949, 3941, 4489, 4537, 4086,
    3191, 1957, 524, -948, -2296, -3374, -4065, -4301, -4060, -3378, -2335, -1053,
    324, 1644, 2760, 3555, 3946, 3898, 3423, 2582, 1473, 224, -1025, -2137,
    -2993, -3503, -3619, -3337, -2695, -1773, -676, 469, 1538, 2413, 3004, 3252,
    3138, 2685, 1949, 1018, 0, -992, -1849, -2482, -2826, -2853, -2567, -2009,
    -1247, -371, 521, 1329, 1969, 2375, 2510, 2367, 1970, 1371, 640, -137,
    -874, -1493, -1929, -2141, -2113, -1855, -1404, -815, -157, 496, 1073, 1513,
    1774, 1833, 1690, 1368, 909, 366, -197, -720, -1146, -1433, -1555, -1503,
    -1289, -943, -506, -28, 437, 839, 1137, 1301, 1320, 1194, 942, 596,
    195, -216, -591, -892, -1088, -1161, -1106, -931, -660, -322, 43, 397,
    701, 923, 1041, 1044, 933, 722, 434, 101, -240, -553, -804, -966,
    -1022, -966, -804, -553, -240, 101, 434, 722, 933, 1044, 1041, 923,
    701, 397, 43, -322, -660, -931, -1106, -1161, -1088, -892, -591, -216,
    195, 596, 942, 1194, 1320, 1301, 1137, 839, 437, -28, -506, -943,
    -1289, -1503, -1555, -1433, -1146, -720, -197, 366, 909, 1368, 1690, 1833,
    1774, 1513, 1073, 496, -157, -815, -1404, -1855, -2113, -2141, -1929, -1493,
    -874, -137, 640, 1371, 1970, 2367, 2510, 2375, 1969, 1329, 521, -371,
    -1247, -2009, -2567, -2853, -2826, -2482, -1849, -992,
];

pub static INDIA_DIAL_TONE: [i16; 320] = [
    0, 960, 1850, 2579, 3070, 3268, 3146, 2708, 1991, 1059, 0, -1083,
    -2083, -2899, -3445, -3661, -3518, -3023, -2219, -1178, 0, 1201, 2306, 3203,
    3800, 4031, 3867, 3318, 2431, 1288, 0, -1309, -2509, -3480, -4121, -4364,
    -4180, -3580, -2619, -1386, 0, 1403, 2685, 3718, 4396, 4648, 4444, 3800,
    2775, 1466, 0, -1480, -2828, -3909, -4614, -4871, -4650, -3970, -2894, -1527,
    0, 1536, 2930, 4044, 4767, 5024, 4789, 4082, 2972, 1565, 0, -1570,
    -2990, -4120, -4848, -5102, -4856, -4133, -3004, -1580, 0, 1580, 3004, 4133,
    4856, 5102, 4848, 4120, 2990, 1570, 0, -1565, -2972, -4082, -4789, -5024,
    -4767, -4044, -2930, -1536, 0, 1527, 2894, 3970, 4650, 4871, 4614, 3909,
    2828, 1480, 0, -1466, -2775, -3800, -4444, -4648, -4396, -3718, -2685, -1403,
    0, 1386, 2619, 3580, 4180, 4364, 4121, 3480, 2509, 1309, 0, -1288,
    -2431, -3318, -3867, -4031, -3800, -3203, -2306, -1201, 0, 1178, 2219, 3023,
    3518, 3661, 3445, 2899, 2083, 1083, 0, -1059, -1991, -2708, -3146, -3268,
    -3070, -2579, -1850, -960, 0, 935, 1756, 2384, 2764, 2867, 2689, 2255,
    1615, 837, 0, -812, -1522, -2064, -2389, -2474, -2316, -1939, -1387, -718,
    0, 695, 1300, 1759, 2034, 2103, 1967, 1645, 1175, 607, 0, -587,
    -1096, -1483, -1713, -1770, -1654, -1383, -987, -510, 0, 492, 920, 1245,
    1438, 1487, 1390, 1162, 830, 429, 0, -416, -778, -1054, -1220, -1264,
    -1184, -993, -711, -369, 0, 359, 675, 918, 1068, 1110, 1045, 881,
    634, 331, 0, -326, -616, -843, -986, -1032, -978, -830, -602, -316,
    0, 316, 602, 830, 978, 1032, 986, 843, 616, 326, 0, -331,
    -634, -881, -1045, -1110, -1068, -918, -675, -359, 0, 369, 711, 993,
    1184, 1264, 1220, 1054, 778, 416, 0, -429, -830, -1162, -1390, -1487,
    -1438, -1245, -920, -492, 0, 510, 987, 1383, 1654, 1770, 1713, 1483,
    1096, 587, 0, -607, -1175, -1645, -1967, -2103, -2034, -1759, -1300, -695,
    0, 718, 1387, 1939, 2316, 2474, 2389, 2064, 1522, 812, 0, -837,
    -1615, -2255, -2689, -2867, -2764, -2384, -1756, -935,
];
