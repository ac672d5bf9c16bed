use alloy::sol;

sol! {
    #[derive(Debug, PartialEq, Eq)]
    interface ISlotMachine {
        event SpinResult(
            address indexed player,
            string combination,
            uint256 monReward,
            uint256 extraSpins,
            bool poppiesNftWon,
            bool rarestPending,
            bool discountApplied,
            bool newDiscountGranted
        );

        function spin() external payable;
        function freeSpins(address player) external view returns (uint256);
        function discountedSpins(address player) external view returns (uint256);
        function hasDiscount(address player) external view returns (bool);
        function getRewardPool() external view returns (uint256);
    }
}
