/// Fixed passphrase word list. 256 entries, so each word carries exactly 8 bits.
pub const WORDS: [&str; 256] = [
    "acorn",
    "alpine",
    "amber",
    "anchor",
    "angel",
    "apple",
    "arbor",
    "arrow",
    "aspen",
    "atlas",
    "aurora",
    "autumn",
    "badge",
    "badger",
    "bamboo",
    "banner",
    "barley",
    "basil",
    "basin",
    "beacon",
    "bear",
    "beetle",
    "birch",
    "bison",
    "blaze",
    "bloom",
    "blossom",
    "bluff",
    "boulder",
    "bramble",
    "breeze",
    "brick",
    "bridge",
    "brook",
    "buffalo",
    "cabin",
    "cactus",
    "camel",
    "canary",
    "candle",
    "canoe",
    "canvas",
    "canyon",
    "caramel",
    "cargo",
    "cedar",
    "cello",
    "chalk",
    "cherry",
    "cider",
    "cinder",
    "circle",
    "citrus",
    "cliff",
    "cloud",
    "clover",
    "cobalt",
    "cocoa",
    "comet",
    "condor",
    "copper",
    "coral",
    "cotton",
    "coyote",
    "crane",
    "crater",
    "creek",
    "cricket",
    "crystal",
    "cypress",
    "dahlia",
    "daisy",
    "dawn",
    "delta",
    "desert",
    "dolphin",
    "dove",
    "dragon",
    "drift",
    "dune",
    "eagle",
    "echo",
    "elm",
    "ember",
    "emerald",
    "fable",
    "falcon",
    "feather",
    "fern",
    "fiddle",
    "field",
    "fig",
    "finch",
    "fjord",
    "flame",
    "flint",
    "forest",
    "fossil",
    "fox",
    "frost",
    "galaxy",
    "garden",
    "garnet",
    "gazelle",
    "gecko",
    "geyser",
    "ginger",
    "glacier",
    "glade",
    "granite",
    "gravel",
    "grove",
    "gull",
    "harbor",
    "harvest",
    "hawk",
    "hazel",
    "hemlock",
    "heron",
    "hickory",
    "hollow",
    "honey",
    "horizon",
    "iris",
    "island",
    "ivory",
    "ivy",
    "jackal",
    "jade",
    "jasper",
    "jungle",
    "juniper",
    "kayak",
    "kelp",
    "kestrel",
    "kettle",
    "koala",
    "lagoon",
    "lantern",
    "larch",
    "lark",
    "lava",
    "lemon",
    "lilac",
    "lily",
    "lime",
    "linen",
    "lotus",
    "lynx",
    "magnet",
    "mango",
    "maple",
    "marble",
    "marsh",
    "meadow",
    "melon",
    "mesa",
    "mesquite",
    "meteor",
    "mint",
    "mist",
    "monsoon",
    "moose",
    "moss",
    "mountain",
    "nebula",
    "nectar",
    "nickel",
    "nova",
    "nutmeg",
    "oak",
    "oasis",
    "ocean",
    "olive",
    "onyx",
    "opal",
    "orbit",
    "orchid",
    "otter",
    "owl",
    "panda",
    "panther",
    "paper",
    "parrot",
    "pebble",
    "pelican",
    "pepper",
    "pine",
    "planet",
    "plum",
    "pollen",
    "pond",
    "poppy",
    "prairie",
    "pumpkin",
    "quail",
    "quartz",
    "quill",
    "quince",
    "rabbit",
    "radar",
    "rain",
    "raven",
    "reef",
    "ridge",
    "river",
    "robin",
    "rocket",
    "ruby",
    "saffron",
    "sage",
    "salmon",
    "sand",
    "sapphire",
    "saturn",
    "scarlet",
    "sequoia",
    "shadow",
    "shell",
    "sierra",
    "silver",
    "slate",
    "sparrow",
    "spruce",
    "squall",
    "star",
    "stone",
    "storm",
    "summit",
    "sun",
    "swan",
    "tango",
    "thistle",
    "thunder",
    "tiger",
    "timber",
    "topaz",
    "trail",
    "tulip",
    "tundra",
    "turtle",
    "umber",
    "valley",
    "velvet",
    "violet",
    "vista",
    "walnut",
    "wave",
    "willow",
    "winter",
    "wolf",
    "wren",
    "yarrow",
    "yew",
    "zephyr",
    "zinc",
];
